//! Location resolver: orchestrates the fallback chain.
//!
//! Flow: device sensor (+ reverse geocode) → IP providers in declared order → Unresolved.
//!
//! Steps never overlap. Every intermediate failure is logged and recorded
//! as an [`AttemptFailure`]; only total exhaustion reaches the caller.

use super::cache::{CachedSensor, FixCache};
use super::geocode::{Place, ReverseGeocoder};
use super::providers::{build_provider, default_providers, IpProvider};
use super::sensor::{acquire_fix, Fix, FixFileSensor, PositionSensor, SensorOptions, StaticSensor};
use super::types::{AttemptFailure, LocationResult, ResolutionMethod, SensorError, Unresolved};
use crate::config::{Config, ConfigError, SensorSource};
use crate::http::HttpClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// City placeholder when a sensor fix could not be named.
pub const UNKNOWN_CITY: &str = "Unknown";

const SENSOR_STRATEGY: &str = "sensor";

/// The location resolver with its fallback pipeline.
pub struct LocationResolver {
    http: Arc<dyn HttpClient>,
    sensor: Option<Arc<dyn PositionSensor>>,
    sensor_opts: SensorOptions,
    geocoder: ReverseGeocoder,
    providers: Vec<Box<dyn IpProvider>>,
}

impl LocationResolver {
    /// No sensor, default geocoder and the stock provider chain.
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            sensor: None,
            sensor_opts: SensorOptions::default(),
            geocoder: ReverseGeocoder::default(),
            providers: default_providers(),
        }
    }

    pub fn from_config(config: &Config, http: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        let providers = config
            .providers
            .iter()
            .map(|p| build_provider(p.kind, p.endpoint.as_deref()))
            .collect::<Vec<_>>();
        if providers.is_empty() {
            warn!("no IP providers configured; only the sensor strategy can succeed");
        }

        let mut resolver = Self::new(http)
            .with_sensor_options(config.sensor_options())
            .with_geocoder(ReverseGeocoder::new(config.reverse_geocode_url.clone()))
            .with_providers(providers);
        resolver.sensor = build_sensor(config)?;
        Ok(resolver)
    }

    pub fn with_sensor(mut self, sensor: Arc<dyn PositionSensor>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    pub fn with_sensor_options(mut self, opts: SensorOptions) -> Self {
        self.sensor_opts = opts;
        self
    }

    pub fn with_geocoder(mut self, geocoder: ReverseGeocoder) -> Self {
        self.geocoder = geocoder;
        self
    }

    pub fn with_providers(mut self, providers: Vec<Box<dyn IpProvider>>) -> Self {
        self.providers = providers;
        self
    }

    pub fn has_sensor(&self) -> bool {
        self.sensor.is_some()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn http(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }

    pub fn geocoder(&self) -> &ReverseGeocoder {
        &self.geocoder
    }

    /// Run the whole chain from scratch.
    pub async fn resolve(&self) -> Result<LocationResult, Unresolved> {
        self.resolve_with_cancel(&CancellationToken::new()).await
    }

    /// Run the chain, giving up early once `cancel` fires.
    pub async fn resolve_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> Result<LocationResult, Unresolved> {
        let mut attempts = Vec::new();

        // 1. Device sensor
        match self.sensor.as_deref() {
            Some(sensor) => match acquire_fix(sensor, &self.sensor_opts, cancel).await {
                Ok(fix) => {
                    debug!(lat = fix.latitude, lon = fix.longitude, "sensor fix acquired");
                    let loc = self.describe_fix(&fix).await;
                    info!(method = %loc.method, place = %loc.place_line(), "location resolved");
                    return Ok(loc);
                }
                Err(SensorError::Cancelled) => {
                    attempts.push(failure(SENSOR_STRATEGY, SensorError::Cancelled));
                    return Err(Unresolved { attempts, cancelled: true });
                }
                Err(e) => {
                    debug!(error = %e, "sensor strategy failed, falling back to IP lookup");
                    attempts.push(failure(SENSOR_STRATEGY, e));
                }
            },
            None => {
                debug!("no position sensor configured");
                attempts.push(failure(
                    SENSOR_STRATEGY,
                    SensorError::Unavailable("no position sensor configured".into()),
                ));
            }
        }

        // 2. IP providers, strictly one at a time
        for provider in &self.providers {
            if cancel.is_cancelled() {
                return Err(Unresolved { attempts, cancelled: true });
            }
            match self.try_provider(provider.as_ref()).await {
                Ok(loc) => {
                    info!(provider = provider.name(), place = %loc.place_line(), "location resolved");
                    return Ok(loc);
                }
                Err(reason) => {
                    warn!(provider = provider.name(), %reason, "IP lookup failed, trying next provider");
                    attempts.push(AttemptFailure {
                        strategy: provider.name().to_string(),
                        reason,
                    });
                }
            }
        }

        // 3. Exhausted
        warn!(attempts = attempts.len(), "all location strategies failed");
        Err(Unresolved { attempts, cancelled: false })
    }

    /// Name a sensor fix. Coordinates are kept even if geocoding fails.
    pub async fn describe_fix(&self, fix: &Fix) -> LocationResult {
        let place = match self
            .geocoder
            .lookup(self.http.as_ref(), fix.latitude, fix.longitude)
            .await
        {
            Ok(place) => place,
            Err(e) => {
                warn!(error = %e, "reverse geocoding failed, keeping raw coordinates");
                Place::default()
            }
        };

        LocationResult {
            city: if place.city.is_empty() {
                UNKNOWN_CITY.to_string()
            } else {
                place.city
            },
            region: place.region,
            country: place.country,
            postal_code: place.postal_code,
            latitude: Some(fix.latitude),
            longitude: Some(fix.longitude),
            source_ip: None,
            method: ResolutionMethod::DeviceSensor,
            provider: None,
        }
    }

    async fn try_provider(&self, provider: &dyn IpProvider) -> Result<LocationResult, String> {
        let payload = self
            .http
            .get_json(provider.endpoint())
            .await
            .map_err(|e| e.to_string())?;
        provider.normalize(&payload).map_err(|e| e.to_string())
    }
}

fn failure(strategy: &str, err: SensorError) -> AttemptFailure {
    AttemptFailure {
        strategy: strategy.to_string(),
        reason: err.to_string(),
    }
}

fn build_sensor(config: &Config) -> Result<Option<Arc<dyn PositionSensor>>, ConfigError> {
    let sensor: Arc<dyn PositionSensor> = match &config.sensor {
        SensorSource::None => return Ok(None),
        SensorSource::Static { latitude, longitude } => Arc::new(
            StaticSensor::new(*latitude, *longitude)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?,
        ),
        SensorSource::FixFile { path } => {
            let sensor = FixFileSensor::new(path.clone());
            if config.cache_fixes {
                let cache = FixCache::load_from(config.fix_cache_path());
                Arc::new(CachedSensor::new(sensor, "fix-file", cache))
            } else {
                Arc::new(sensor)
            }
        }
    };
    Ok(Some(sensor))
}
