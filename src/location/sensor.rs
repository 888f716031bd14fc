//! Device position sensors.
//!
//! The platform position API is modelled as [`PositionSensor`]. The resolver
//! never calls a sensor directly; it goes through [`acquire_fix`], which is
//! the single suspend point bounded by the timeout and the cancellation
//! token.

use super::types::SensorError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long to wait for a fix and how old a reused fix may be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorOptions {
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(5 * 60),
        }
    }
}

/// A position reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    pub taken_at: DateTime<Utc>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, SensorError> {
        if !valid_coords(latitude, longitude) {
            return Err(SensorError::Unavailable(format!(
                "coordinates out of range: {}, {}",
                latitude, longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            accuracy_m: None,
            taken_at: Utc::now(),
        })
    }

    /// Age relative to `now`; a fix stamped in the future counts as fresh.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.taken_at).to_std().unwrap_or(Duration::ZERO)
    }
}

pub fn valid_coords(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

#[async_trait]
pub trait PositionSensor: Send + Sync {
    async fn current_position(&self, opts: &SensorOptions) -> Result<Fix, SensorError>;
}

/// Race the sensor against `opts.timeout` and the cancellation token.
pub async fn acquire_fix(
    sensor: &dyn PositionSensor,
    opts: &SensorOptions,
    cancel: &CancellationToken,
) -> Result<Fix, SensorError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SensorError::Cancelled),
        res = tokio::time::timeout(opts.timeout, sensor.current_position(opts)) => {
            res.unwrap_or(Err(SensorError::Timeout))
        }
    }
}

/// Fixed coordinates, e.g. from `--lat/--lon` or the config file.
pub struct StaticSensor {
    latitude: f64,
    longitude: f64,
}

impl StaticSensor {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, SensorError> {
        Fix::new(latitude, longitude)?;
        Ok(Self { latitude, longitude })
    }
}

#[async_trait]
impl PositionSensor for StaticSensor {
    async fn current_position(&self, _opts: &SensorOptions) -> Result<Fix, SensorError> {
        Fix::new(self.latitude, self.longitude)
    }
}

#[derive(Deserialize)]
struct FixFileBody {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Reads the latest fix a GPS daemon wrote to a JSON file.
///
/// A reading older than `maximum_age` means the daemon has stopped
/// updating the file, so it is reported as unavailable.
pub struct FixFileSensor {
    path: PathBuf,
}

impl FixFileSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PositionSensor for FixFileSensor {
    async fn current_position(&self, opts: &SensorOptions) -> Result<Fix, SensorError> {
        let data = tokio::fs::read_to_string(&self.path).await.map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => SensorError::PermissionDenied,
            ErrorKind::NotFound => {
                SensorError::Unavailable(format!("no fix file at {}", self.path.display()))
            }
            _ => SensorError::Unavailable(e.to_string()),
        })?;

        let body: FixFileBody = serde_json::from_str(&data)
            .map_err(|e| SensorError::Unavailable(format!("malformed fix file: {}", e)))?;

        let mut fix = Fix::new(body.latitude, body.longitude)?;
        fix.accuracy_m = body.accuracy;
        if let Some(ts) = body.timestamp {
            fix.taken_at = ts;
        }
        if fix.age(Utc::now()) > opts.maximum_age {
            return Err(SensorError::Unavailable(format!(
                "stale fix from {}",
                fix.taken_at.to_rfc3339()
            )));
        }
        Ok(fix)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a canned result after an optional delay and counts calls.
    pub struct ScriptedSensor {
        result: Result<Fix, SensorError>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedSensor {
        pub fn fix(lat: f64, lon: f64) -> Self {
            Self {
                result: Ok(Fix::new(lat, lon).unwrap()),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(err: SensorError) -> Self {
            Self {
                result: Err(err),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PositionSensor for ScriptedSensor {
        async fn current_position(&self, _opts: &SensorOptions) -> Result<Fix, SensorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            self.result.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedSensor;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_static_sensor_rejects_bad_coords() {
        assert!(StaticSensor::new(95.0, 0.0).is_err());
        assert!(StaticSensor::new(0.0, -181.0).is_err());
        assert!(StaticSensor::new(-90.0, 180.0).is_ok());
    }

    #[tokio::test]
    async fn test_static_sensor_reports_coords() {
        let s = StaticSensor::new(59.33, 18.07).unwrap();
        let fix = s.current_position(&SensorOptions::default()).await.unwrap();
        assert_eq!((fix.latitude, fix.longitude), (59.33, 18.07));
    }

    #[tokio::test]
    async fn test_fix_file_missing_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let s = FixFileSensor::new(dir.path().join("nope.json"));
        let err = s.current_position(&SensorOptions::default()).await.unwrap_err();
        assert!(matches!(err, SensorError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_fix_file_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fix.json");
        let taken = (Utc::now() - chrono::Duration::seconds(30)).to_rfc3339();
        fs::write(
            &path,
            format!(
                r#"{{"latitude": 69.6492, "longitude": 18.9553, "accuracy": 12.5, "timestamp": "{}"}}"#,
                taken
            ),
        )
        .unwrap();

        let fix = FixFileSensor::new(&path)
            .current_position(&SensorOptions::default())
            .await
            .unwrap();
        approx::assert_abs_diff_eq!(fix.latitude, 69.6492);
        assert_eq!(fix.accuracy_m, Some(12.5));
        assert_eq!(fix.taken_at.to_rfc3339(), taken);
    }

    #[tokio::test]
    async fn test_fix_file_stale_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fix.json");
        fs::write(
            &path,
            r#"{"latitude": 10.0, "longitude": 20.0, "timestamp": "2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let err = FixFileSensor::new(&path)
            .current_position(&SensorOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SensorError::Unavailable(msg) if msg.starts_with("stale fix")));
    }

    #[tokio::test]
    async fn test_fix_file_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fix.json");
        fs::write(&path, "{not json").unwrap();
        let err = FixFileSensor::new(&path)
            .current_position(&SensorOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SensorError::Unavailable(msg) if msg.starts_with("malformed")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out() {
        let sensor = ScriptedSensor::fix(1.0, 2.0).with_delay(Duration::from_secs(60));
        let opts = SensorOptions::default();
        let err = acquire_fix(&sensor, &opts, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err, SensorError::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_within_timeout() {
        let sensor = ScriptedSensor::fix(1.0, 2.0).with_delay(Duration::from_secs(3));
        let fix = acquire_fix(&sensor, &SensorOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(fix.latitude, 1.0);
    }

    #[tokio::test]
    async fn test_acquire_cancelled() {
        let sensor = ScriptedSensor::fix(1.0, 2.0).with_delay(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = acquire_fix(&sensor, &SensorOptions::default(), &cancel).await.unwrap_err();
        assert_eq!(err, SensorError::Cancelled);
    }

    #[test]
    fn test_fix_age_never_negative() {
        let mut fix = Fix::new(0.0, 0.0).unwrap();
        fix.taken_at = Utc::now() + chrono::Duration::seconds(30);
        assert_eq!(fix.age(Utc::now()), Duration::ZERO);
    }
}
