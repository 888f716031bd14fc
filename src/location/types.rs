//! Core types for the location subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which strategy produced a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMethod {
    DeviceSensor,
    IpLookup,
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceSensor => write!(f, "Device"),
            Self::IpLookup => write!(f, "IP"),
        }
    }
}

/// A best-effort description of where the client is.
///
/// With `DeviceSensor` the coordinates are always present; the place names
/// come from reverse geocoding and may be blank. With `IpLookup` anything
/// may be missing except the city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResult {
    pub city: String,
    pub region: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    pub method: ResolutionMethod,
    /// Name of the IP provider that answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl LocationResult {
    /// "City, Region, Country" with blank parts skipped.
    pub fn place_line(&self) -> String {
        [&self.city, &self.region, &self.country]
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn display_line(&self) -> String {
        let mut line = format!("\u{1F4CD} {}", self.place_line());
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            line.push_str(&format!("  ({})", format_coords(lat, lon)));
        }
        if let Some(ref postal) = self.postal_code {
            line.push_str(&format!("  [{}]", postal));
        }
        match (&self.source_ip, &self.provider) {
            (Some(ip), Some(p)) => line.push_str(&format!("  via {} ({})", p, ip)),
            (None, Some(p)) => line.push_str(&format!("  via {}", p)),
            _ => line.push_str(&format!("  via {}", self.method)),
        }
        line
    }
}

/// Format coordinates as "37.7700°N, 122.4200°W".
pub fn format_coords(lat: f64, lon: f64) -> String {
    let ns = if lat >= 0.0 { 'N' } else { 'S' };
    let ew = if lon >= 0.0 { 'E' } else { 'W' };
    format!("{:.4}\u{00B0}{}, {:.4}\u{00B0}{}", lat.abs(), ns, lon.abs(), ew)
}

/// One failed step of the fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptFailure {
    pub strategy: String,
    pub reason: String,
}

/// Every strategy failed; the caller should offer a manual retry.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("location unavailable after {} attempt(s)", .attempts.len())]
pub struct Unresolved {
    pub attempts: Vec<AttemptFailure>,
    pub cancelled: bool,
}

/// Why the position sensor gave no reading.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    #[error("permission to read the position sensor was denied")]
    PermissionDenied,
    #[error("position sensor unavailable: {0}")]
    Unavailable(String),
    #[error("position sensor timed out")]
    Timeout,
    #[error("position request cancelled")]
    Cancelled,
}

/// Why a provider's successfully fetched payload is not a usable result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("provider reported failure: {0}")]
    ProviderFailure(String),
    #[error("response has no city")]
    MissingCity,
    #[error("unexpected response shape: {0}")]
    Shape(String),
}
