//! Dashboard refresh cycle.
//!
//! One cycle fans out to the location resolver, the earthquake feed and the
//! ISS tracker concurrently. Every branch is isolated: its failure becomes
//! a `Failed` panel and never holds up the others. A cycle requested while
//! another is still running is skipped.

pub mod render;

use crate::config::{Config, ConfigError, EarthquakeConfig};
use crate::feeds::earthquakes::{fetch_earthquakes, Earthquake};
use crate::feeds::iss::{fetch_iss, IssPosition};
use crate::http::HttpClient;
use crate::location::{LocationResolver, LocationResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use render::{format_time, render_text};

/// One widget's outcome for a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Panel<T> {
    Ready { data: T },
    Failed { message: String },
}

impl<T> Panel<T> {
    fn from_result<E: Display>(res: Result<T, E>, what: &str) -> Self {
        match res {
            Ok(data) => Panel::Ready { data },
            Err(e) => {
                warn!(panel = what, error = %e, "panel failed");
                Panel::Failed { message: e.to_string() }
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Panel::Ready { data } => Some(data),
            Panel::Failed { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Panel::Ready { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub updated_at: DateTime<Utc>,
    pub location: Panel<LocationResult>,
    pub earthquakes: Panel<Vec<Earthquake>>,
    pub iss: Panel<IssPosition>,
    /// Threshold the earthquake list was filtered with.
    pub min_magnitude: f64,
}

pub struct Dashboard {
    resolver: LocationResolver,
    quakes: EarthquakeConfig,
    iss_url: String,
    latest: RwLock<Option<Snapshot>>,
    running: Mutex<()>,
}

impl Dashboard {
    pub fn new(resolver: LocationResolver, quakes: EarthquakeConfig, iss_url: impl Into<String>) -> Self {
        Self {
            resolver,
            quakes,
            iss_url: iss_url.into(),
            latest: RwLock::new(None),
            running: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config, http: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        let resolver = LocationResolver::from_config(config, http)?;
        Ok(Self::new(resolver, config.earthquakes.clone(), config.iss_url.clone()))
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// The most recent completed snapshot.
    pub async fn latest(&self) -> Option<Snapshot> {
        self.latest.read().await.clone()
    }

    /// Run one cycle unless one is already in flight.
    pub async fn refresh_if_idle(&self, cancel: &CancellationToken) -> Option<Snapshot> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("refresh already in flight, skipping");
            return None;
        };

        let snapshot = self.collect(cancel).await;
        *self.latest.write().await = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Fetch all panels concurrently without touching the stored snapshot.
    pub async fn collect(&self, cancel: &CancellationToken) -> Snapshot {
        let http = self.resolver.http().as_ref();
        let (location, earthquakes, iss) = tokio::join!(
            self.resolver.resolve_with_cancel(cancel),
            fetch_earthquakes(http, &self.quakes),
            fetch_iss(http, &self.iss_url, self.resolver.geocoder()),
        );

        Snapshot {
            updated_at: Utc::now(),
            location: Panel::from_result(location, "location"),
            earthquakes: Panel::from_result(earthquakes, "earthquakes"),
            iss: Panel::from_result(iss, "iss"),
            min_magnitude: self.quakes.min_magnitude,
        }
    }

    /// Refresh now and then every `every` until `cancel` fires.
    pub async fn run_periodic(&self, every: Duration, cancel: &CancellationToken) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_s = every.as_secs(), "refresh loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(s) = self.refresh_if_idle(cancel).await {
                        info!(
                            location = s.location.is_ready(),
                            earthquakes = s.earthquakes.is_ready(),
                            iss = s.iss.is_ready(),
                            "dashboard refreshed"
                        );
                    }
                }
            }
        }
        info!("refresh loop stopped");
    }

    /// Hand each newly stored snapshot to `show`, polling once a second,
    /// until `shutdown` completes.
    pub async fn follow<F>(&self, shutdown: F, mut show: impl FnMut(&Snapshot))
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut shown = None;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let Some(snapshot) = self.latest().await else { continue };
                    if shown == Some(snapshot.updated_at) {
                        continue;
                    }
                    shown = Some(snapshot.updated_at);
                    show(&snapshot);
                }
            }
        }
    }
}
