//! Public data feeds shown next to the location panel.

pub mod earthquakes;
pub mod iss;

use crate::http::FetchError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unexpected feed shape: {0}")]
    Shape(String),
}

pub use earthquakes::{Earthquake, Severity};
pub use iss::IssPosition;
