//! Configuration loaded from ~/.vantage/config.json.
//!
//! Every field has a default, so a partial file (or none at all) is fine.
//! CLI flags are applied on top by `main`.

use crate::location::geocode::BIGDATACLOUD_ENDPOINT;
use crate::location::providers::ProviderKind;
use crate::location::sensor::{valid_coords, SensorOptions};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const USGS_FEED_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/4.5_day.geojson";
pub const ISS_URL: &str = "https://api.wheretheiss.at/v1/satellites/25544";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Where device positions come from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorSource {
    /// No position capability; the chain starts at IP lookup.
    #[default]
    None,
    Static { latitude: f64, longitude: f64 },
    /// JSON fix written by an external GPS daemon.
    FixFile { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub kind: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl From<ProviderKind> for ProviderEntry {
    fn from(kind: ProviderKind) -> Self {
        Self { kind, endpoint: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthquakeConfig {
    pub feed_url: String,
    pub limit: usize,
    pub min_magnitude: f64,
}

impl Default for EarthquakeConfig {
    fn default() -> Self {
        Self {
            feed_url: USGS_FEED_URL.into(),
            limit: 5,
            min_magnitude: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sensor: SensorSource,
    pub sensor_timeout_secs: u64,
    pub sensor_max_age_secs: u64,
    /// Persist fix-file readings so recent ones can be reused.
    pub cache_fixes: bool,
    pub fix_cache_path: Option<PathBuf>,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub reverse_geocode_url: String,
    /// Tried in this order during IP lookup.
    pub providers: Vec<ProviderEntry>,
    pub earthquakes: EarthquakeConfig,
    pub iss_url: String,
    pub refresh_interval_secs: u64,
    /// IANA name used for "Last updated"; local time when absent.
    pub display_tz: Option<String>,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensor: SensorSource::None,
            sensor_timeout_secs: 10,
            sensor_max_age_secs: 5 * 60,
            cache_fixes: true,
            fix_cache_path: None,
            http_timeout_secs: 15,
            user_agent: format!("vantage/{}", env!("CARGO_PKG_VERSION")),
            reverse_geocode_url: BIGDATACLOUD_ENDPOINT.into(),
            providers: vec![
                ProviderKind::Ipwho.into(),
                ProviderKind::Ipinfo.into(),
                ProviderKind::Ipapi.into(),
            ],
            earthquakes: EarthquakeConfig::default(),
            iss_url: ISS_URL.into(),
            refresh_interval_secs: 10 * 60,
            display_tz: None,
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vantage")
            .join("config.json")
    }

    /// Load `explicit` (must exist), else the default path if present,
    /// else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match explicit {
            Some(path) => Self::load_from(path)?,
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor_timeout_secs == 0 {
            return Err(ConfigError::Invalid("sensor_timeout_secs must be positive".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid("http_timeout_secs must be positive".into()));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid("refresh_interval_secs must be positive".into()));
        }
        if self.earthquakes.limit == 0 {
            return Err(ConfigError::Invalid("earthquakes.limit must be positive".into()));
        }
        if let SensorSource::Static { latitude, longitude } = self.sensor {
            if !valid_coords(latitude, longitude) {
                return Err(ConfigError::Invalid(
                    "static sensor coordinates out of range (lat -90..90, lon -180..180)".into(),
                ));
            }
        }
        self.display_tz()?;
        Ok(())
    }

    pub fn sensor_options(&self) -> SensorOptions {
        SensorOptions {
            timeout: Duration::from_secs(self.sensor_timeout_secs),
            maximum_age: Duration::from_secs(self.sensor_max_age_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn display_tz(&self) -> Result<Option<Tz>, ConfigError> {
        match &self.display_tz {
            Some(name) => name
                .parse::<Tz>()
                .map(Some)
                .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", name))),
            None => Ok(None),
        }
    }

    pub fn fix_cache_path(&self) -> PathBuf {
        self.fix_cache_path
            .clone()
            .unwrap_or_else(crate::location::cache::FixCache::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.sensor, SensorSource::None);
        assert_eq!(c.sensor_options(), SensorOptions::default());
        assert_eq!(c.refresh_interval(), Duration::from_secs(600));
        let kinds: Vec<ProviderKind> = c.providers.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![ProviderKind::Ipwho, ProviderKind::Ipinfo, ProviderKind::Ipapi]);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "sensor": {"type": "static", "latitude": 37.77, "longitude": -122.42},
                "providers": [{"kind": "ipapi", "endpoint": "http://localhost:9999/json"}],
                "earthquakes": {"limit": 3},
                "display_tz": "America/Los_Angeles"
            }"#,
        )
        .unwrap();

        let c = Config::load(Some(&path)).unwrap();
        assert_eq!(c.sensor, SensorSource::Static { latitude: 37.77, longitude: -122.42 });
        assert_eq!(c.providers.len(), 1);
        assert_eq!(c.providers[0].endpoint.as_deref(), Some("http://localhost:9999/json"));
        assert_eq!(c.earthquakes.limit, 3);
        assert_eq!(c.earthquakes.feed_url, USGS_FEED_URL);
        assert_eq!(c.sensor_timeout_secs, 10);
        assert_eq!(c.display_tz().unwrap(), Some(chrono_tz::America::Los_Angeles));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ sensor: ").unwrap();
        assert!(matches!(Config::load(Some(&path)), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_rejects_bad_timezone() {
        let c = Config {
            display_tz: Some("Mars/Olympus".into()),
            ..Config::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_static_coords() {
        let c = Config {
            sensor: SensorSource::Static { latitude: 120.0, longitude: 0.0 },
            ..Config::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_fix_file_source_parses() {
        let s: SensorSource =
            serde_json::from_str(r#"{"type": "fix_file", "path": "/run/gps/fix.json"}"#).unwrap();
        assert_eq!(s, SensorSource::FixFile { path: PathBuf::from("/run/gps/fix.json") });
    }
}
