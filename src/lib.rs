//! Vantage: fail-open location resolution and a small live dashboard.
//!
//! The location chain tries a device position sensor first, then a list of
//! IP geolocation providers in order, and reports `Unresolved` only when
//! every strategy has failed.

pub mod config;
pub mod contact;
pub mod dashboard;
pub mod feeds;
pub mod http;
pub mod location;
pub mod server;
