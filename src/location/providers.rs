//! IP lookup providers: ipwho.is, ipinfo.io and ipapi.co.
//!
//! Each provider declares where to send the request and how to turn its own
//! response shape into a [`LocationResult`]. Normalizers are pure, so the
//! fallback loop in the resolver stays generic over the provider list.

use super::types::{LocationResult, Rejection, ResolutionMethod};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const IPWHO_ENDPOINT: &str = "https://ipwho.is/";
pub const IPINFO_ENDPOINT: &str = "https://ipinfo.io/json";
pub const IPAPI_ENDPOINT: &str = "https://ipapi.co/json/";

/// An IP geolocation service tried during the IP-lookup strategy.
pub trait IpProvider: Send + Sync {
    /// Short name used in logs and on results.
    fn name(&self) -> &str;

    fn endpoint(&self) -> &str;

    /// Map a fetched payload to a result, or say why it is not one.
    fn normalize(&self, payload: &Value) -> Result<LocationResult, Rejection>;
}

/// Known provider implementations, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ipwho,
    Ipinfo,
    Ipapi,
}

/// Build a boxed provider, using the default endpoint unless overridden.
pub fn build_provider(kind: ProviderKind, endpoint: Option<&str>) -> Box<dyn IpProvider> {
    match kind {
        ProviderKind::Ipwho => Box::new(IpWho {
            endpoint: endpoint.unwrap_or(IPWHO_ENDPOINT).to_string(),
        }),
        ProviderKind::Ipinfo => Box::new(IpInfo {
            endpoint: endpoint.unwrap_or(IPINFO_ENDPOINT).to_string(),
        }),
        ProviderKind::Ipapi => Box::new(IpApi {
            endpoint: endpoint.unwrap_or(IPAPI_ENDPOINT).to_string(),
        }),
    }
}

/// The stock chain: ipwho → ipinfo → ipapi.
pub fn default_providers() -> Vec<Box<dyn IpProvider>> {
    [ProviderKind::Ipwho, ProviderKind::Ipinfo, ProviderKind::Ipapi]
        .into_iter()
        .map(|k| build_provider(k, None))
        .collect()
}

fn parse<T: for<'de> Deserialize<'de>>(payload: &Value) -> Result<T, Rejection> {
    T::deserialize(payload).map_err(|e| Rejection::Shape(e.to_string()))
}

/// Non-empty, trimmed city or `MissingCity`.
fn require_city(city: Option<String>) -> Result<String, Rejection> {
    match city.map(|c| c.trim().to_string()) {
        Some(c) if !c.is_empty() => Ok(c),
        _ => Err(Rejection::MissingCity),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn ip_result(
    provider: &str,
    city: String,
    region: Option<String>,
    country: Option<String>,
    postal: Option<String>,
    coords: Option<(f64, f64)>,
    ip: Option<String>,
) -> LocationResult {
    LocationResult {
        city,
        region: region.unwrap_or_default(),
        country: country.unwrap_or_default(),
        postal_code: non_empty(postal),
        latitude: coords.map(|c| c.0),
        longitude: coords.map(|c| c.1),
        source_ip: non_empty(ip),
        method: ResolutionMethod::IpLookup,
        provider: Some(provider.to_string()),
    }
}

// ─── Provider A: ipwho.is ──────────────────────────────────────────

#[derive(Deserialize)]
struct IpWhoResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    ip: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    postal: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// ipwho.is: failure is signalled by `success: false` in a 200 body.
pub struct IpWho {
    endpoint: String,
}

impl IpProvider for IpWho {
    fn name(&self) -> &str {
        "ipwho"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn normalize(&self, payload: &Value) -> Result<LocationResult, Rejection> {
        let r: IpWhoResponse = parse(payload)?;
        if r.success != Some(true) {
            return Err(Rejection::ProviderFailure(
                r.message.unwrap_or_else(|| "success flag not set".into()),
            ));
        }
        let city = require_city(r.city)?;
        let coords = r.latitude.zip(r.longitude);
        Ok(ip_result(self.name(), city, r.region, r.country, r.postal, coords, r.ip))
    }
}

// ─── Provider B: ipinfo.io ─────────────────────────────────────────

#[derive(Deserialize)]
struct IpInfoResponse {
    #[serde(default)]
    error: Option<Value>,
    ip: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    postal: Option<String>,
    /// "lat,lon"
    loc: Option<String>,
}

/// ipinfo.io: failure is signalled by the presence of an `error` object.
pub struct IpInfo {
    endpoint: String,
}

impl IpProvider for IpInfo {
    fn name(&self) -> &str {
        "ipinfo"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn normalize(&self, payload: &Value) -> Result<LocationResult, Rejection> {
        let r: IpInfoResponse = parse(payload)?;
        if let Some(err) = r.error {
            let msg = err
                .get("message")
                .or_else(|| err.get("title"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(Rejection::ProviderFailure(msg));
        }
        let city = require_city(r.city)?;
        let coords = r.loc.as_deref().and_then(parse_lat_lon);
        Ok(ip_result(self.name(), city, r.region, r.country, r.postal, coords, r.ip))
    }
}

/// Parse ipinfo's combined "lat,lon" field.
pub fn parse_lat_lon(loc: &str) -> Option<(f64, f64)> {
    let (lat, lon) = loc.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Some((lat, lon))
    } else {
        None
    }
}

// ─── Provider C: ipapi.co ──────────────────────────────────────────

#[derive(Deserialize)]
struct IpApiResponse {
    ip: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    postal: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// ipapi.co: a 200 with a city is success.
pub struct IpApi {
    endpoint: String,
}

impl IpProvider for IpApi {
    fn name(&self) -> &str {
        "ipapi"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn normalize(&self, payload: &Value) -> Result<LocationResult, Rejection> {
        let r: IpApiResponse = parse(payload)?;
        let city = require_city(r.city)?;
        let coords = r.latitude.zip(r.longitude);
        Ok(ip_result(self.name(), city, r.region, r.country_name, r.postal, coords, r.ip))
    }
}
