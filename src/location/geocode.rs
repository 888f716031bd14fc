//! Reverse geocoding: coordinates → place names.

use crate::http::{with_query, FetchError, HttpClient};
use serde_json::Value;

pub const BIGDATACLOUD_ENDPOINT: &str =
    "https://api.bigdatacloud.net/data/reverse-geocode-client";

/// Place names for a coordinate pair. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Place {
    pub city: String,
    pub region: String,
    pub country: String,
    pub postal_code: Option<String>,
}

/// Client for a BigDataCloud-shaped reverse geocoding endpoint.
pub struct ReverseGeocoder {
    endpoint: String,
}

impl ReverseGeocoder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    pub fn url_for(&self, lat: f64, lon: f64) -> String {
        with_query(
            &self.endpoint,
            &[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("localityLanguage", "en".to_string()),
            ],
        )
    }

    pub async fn lookup(
        &self,
        http: &dyn HttpClient,
        lat: f64,
        lon: f64,
    ) -> Result<Place, FetchError> {
        let payload = http.get_json(&self.url_for(lat, lon)).await?;
        parse_place(&payload)
    }
}

impl Default for ReverseGeocoder {
    fn default() -> Self {
        Self::new(BIGDATACLOUD_ENDPOINT)
    }
}

/// Lenient parse: a missing, null or non-string field reads as empty.
/// Only a non-object body is an error.
pub fn parse_place(payload: &Value) -> Result<Place, FetchError> {
    if !payload.is_object() {
        return Err(FetchError::Body("reverse geocode body is not an object".into()));
    }

    let mut city = text(payload, "city");
    if city.is_empty() {
        city = text(payload, "locality");
    }
    let postcode = text(payload, "postcode");

    Ok(Place {
        city,
        region: text(payload, "principalSubdivision"),
        country: text(payload, "countryName"),
        postal_code: if postcode.is_empty() { None } else { Some(postcode) },
    })
}

fn text(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}
