//! International Space Station tracker (wheretheiss.at).

use super::FeedError;
use crate::http::HttpClient;
use crate::location::geocode::ReverseGeocoder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
    pub velocity_kmh: f64,
    /// "daylight" or "eclipsed".
    pub visibility: String,
    pub timestamp: DateTime<Utc>,
    /// Country below the station; absent over open water.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub over: Option<String>,
}

#[derive(Deserialize)]
struct SatelliteResponse {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    altitude: f64,
    #[serde(default)]
    velocity: f64,
    #[serde(default)]
    visibility: String,
    #[serde(default)]
    timestamp: Option<i64>,
}

pub fn parse_position(payload: &Value) -> Result<IssPosition, FeedError> {
    let r = SatelliteResponse::deserialize(payload).map_err(|e| FeedError::Shape(e.to_string()))?;
    let timestamp = r
        .timestamp
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    Ok(IssPosition {
        latitude: r.latitude,
        longitude: r.longitude,
        altitude_km: r.altitude,
        velocity_kmh: r.velocity,
        visibility: r.visibility,
        timestamp,
        over: None,
    })
}

/// Current position, then a best-effort "over" lookup.
pub async fn fetch_iss(
    http: &dyn HttpClient,
    url: &str,
    geocoder: &ReverseGeocoder,
) -> Result<IssPosition, FeedError> {
    let payload = http.get_json(url).await?;
    let mut pos = parse_position(&payload)?;

    match geocoder.lookup(http, pos.latitude, pos.longitude).await {
        Ok(place) if !place.country.is_empty() => pos.over = Some(place.country),
        Ok(_) => {}
        Err(e) => tracing::debug!(error = %e, "could not name ISS ground point"),
    }
    Ok(pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::ScriptedClient;
    use crate::http::FetchError;
    use serde_json::json;

    const ISS: &str = "https://iss.test/v1/satellites/25544";
    const GEO: &str = "https://geo.test/reverse";

    fn sample() -> Value {
        json!({
            "name": "iss", "id": 25544,
            "latitude": -12.5, "longitude": 130.8,
            "altitude": 418.2, "velocity": 27580.1,
            "visibility": "daylight", "timestamp": 1767225600
        })
    }

    #[test]
    fn test_parse_position() {
        let pos = parse_position(&sample()).unwrap();
        approx::assert_abs_diff_eq!(pos.altitude_km, 418.2);
        assert_eq!(pos.visibility, "daylight");
        assert_eq!(pos.timestamp.timestamp(), 1_767_225_600);
        assert!(pos.over.is_none());
    }

    #[test]
    fn test_parse_requires_coordinates() {
        assert!(matches!(parse_position(&json!({"altitude": 400.0})), Err(FeedError::Shape(_))));
    }

    #[tokio::test]
    async fn test_fetch_names_country() {
        let http = ScriptedClient::new()
            .route(ISS, Ok(sample()))
            .route(GEO, Ok(json!({"countryName": "Australia"})));
        let pos = fetch_iss(&http, ISS, &ReverseGeocoder::new(GEO)).await.unwrap();
        assert_eq!(pos.over.as_deref(), Some("Australia"));
    }

    #[tokio::test]
    async fn test_fetch_over_ocean() {
        let http = ScriptedClient::new()
            .route(ISS, Ok(sample()))
            .route(GEO, Ok(json!({"countryName": ""})));
        let pos = fetch_iss(&http, ISS, &ReverseGeocoder::new(GEO)).await.unwrap();
        assert!(pos.over.is_none());
    }

    #[tokio::test]
    async fn test_geocode_failure_is_not_fatal() {
        let http = ScriptedClient::new()
            .route(ISS, Ok(sample()))
            .route(GEO, Err(FetchError::Status(429)));
        assert!(fetch_iss(&http, ISS, &ReverseGeocoder::new(GEO)).await.is_ok());
    }

    #[tokio::test]
    async fn test_tracker_down() {
        let http = ScriptedClient::new();
        let err = fetch_iss(&http, ISS, &ReverseGeocoder::new(GEO)).await.unwrap_err();
        assert!(matches!(err, FeedError::Fetch(FetchError::Transport(_))));
    }
}
