//! Last-fix cache at ~/.vantage/last_fix.json.
//!
//! Backs the "maximum age" side of the sensor options: a fix younger than
//! the allowed age is handed back without waking the sensor. This caches
//! raw readings only, never resolved locations.

use super::sensor::{Fix, PositionSensor, SensorOptions};
use super::types::SensorError;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Serialize, Deserialize, Clone)]
struct CacheFile {
    fix: Fix,
    #[serde(default)]
    sensor: Option<String>,
}

/// The persisted last fix.
pub struct FixCache {
    path: PathBuf,
    entry: Option<CacheFile>,
}

impl FixCache {
    /// Load from a specific path. Unreadable or corrupt files start empty.
    pub fn load_from(path: PathBuf) -> Self {
        let entry = Self::read_file(&path);
        Self { path, entry }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vantage")
            .join("last_fix.json")
    }

    fn read_file(path: &Path) -> Option<CacheFile> {
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// The cached fix if it is no older than `maximum_age`.
    pub fn get(&self, maximum_age: Duration) -> Option<Fix> {
        let entry = self.entry.as_ref()?;
        if entry.fix.age(Utc::now()) > maximum_age {
            return None;
        }
        Some(entry.fix.clone())
    }

    /// Remember `fix` and write it to disk.
    pub fn put(&mut self, fix: &Fix, sensor: &str) {
        self.entry = Some(CacheFile {
            fix: fix.clone(),
            sensor: Some(sensor.to_string()),
        });
        self.persist();
    }

    fn persist(&self) {
        let Some(ref entry) = self.entry else { return };
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::debug!(path = %parent.display(), error = %e, "could not create fix cache directory");
            }
        }
        match serde_json::to_string_pretty(entry) {
            Ok(json) => {
                if let Err(e) = fs::write(&self.path, json) {
                    tracing::debug!(path = %self.path.display(), error = %e, "could not persist last fix");
                }
            }
            Err(e) => tracing::debug!(error = %e, "could not encode last fix"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

/// Serves a recent cached fix, otherwise asks the wrapped sensor.
pub struct CachedSensor<S> {
    inner: S,
    name: String,
    cache: Mutex<FixCache>,
}

impl<S: PositionSensor> CachedSensor<S> {
    pub fn new(inner: S, name: impl Into<String>, cache: FixCache) -> Self {
        Self {
            inner,
            name: name.into(),
            cache: Mutex::new(cache),
        }
    }

    fn cached(&self, maximum_age: Duration) -> Option<Fix> {
        self.cache.lock().ok()?.get(maximum_age)
    }
}

#[async_trait]
impl<S: PositionSensor> PositionSensor for CachedSensor<S> {
    async fn current_position(&self, opts: &SensorOptions) -> Result<Fix, SensorError> {
        if let Some(fix) = self.cached(opts.maximum_age) {
            tracing::debug!(sensor = %self.name, age_s = fix.age(Utc::now()).as_secs(), "reusing cached fix");
            return Ok(fix);
        }

        let fix = self.inner.current_position(opts).await?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(&fix, &self.name);
        }
        Ok(fix)
    }
}
