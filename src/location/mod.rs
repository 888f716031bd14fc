//! Location subsystem.
//!
//! Resolves "where is this client" through an ordered, fail-open chain:
//! device position sensor (named by reverse geocoding), then IP lookup
//! providers one by one.

pub mod cache;
pub mod geocode;
pub mod providers;
pub mod resolver;
pub mod sensor;
pub mod types;

pub use providers::{IpProvider, ProviderKind};
pub use resolver::LocationResolver;
pub use sensor::{Fix, PositionSensor, SensorOptions};
pub use types::{
    format_coords, AttemptFailure, LocationResult, Rejection, ResolutionMethod, SensorError,
    Unresolved,
};
