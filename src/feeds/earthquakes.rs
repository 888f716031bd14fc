//! USGS earthquake summary feed.

use super::FeedError;
use crate::config::EarthquakeConfig;
use crate::http::HttpClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Display bucket for a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Severe,
}

impl Severity {
    pub fn from_magnitude(mag: f64) -> Self {
        if mag < 4.5 {
            Self::Low
        } else if mag < 5.5 {
            Self::Medium
        } else if mag < 6.5 {
            Self::High
        } else {
            Self::Severe
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Severe => write!(f, "severe"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Earthquake {
    pub id: String,
    pub magnitude: f64,
    pub place: String,
    pub time: DateTime<Utc>,
    pub severity: Severity,
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    id: String,
    properties: Properties,
}

#[derive(Deserialize)]
struct Properties {
    mag: Option<f64>,
    place: Option<String>,
    /// Epoch milliseconds.
    time: Option<i64>,
}

/// Strongest `limit` quakes at or above `min_magnitude`, strongest first.
///
/// Features without a magnitude or time are skipped rather than failing
/// the whole feed.
pub fn parse_feed(
    payload: &Value,
    min_magnitude: f64,
    limit: usize,
) -> Result<Vec<Earthquake>, FeedError> {
    let collection = FeatureCollection::deserialize(payload)
        .map_err(|e| FeedError::Shape(e.to_string()))?;

    let mut quakes: Vec<Earthquake> = collection
        .features
        .into_iter()
        .filter_map(|f| {
            let mag = f.properties.mag?;
            let time = DateTime::<Utc>::from_timestamp_millis(f.properties.time?)?;
            Some(Earthquake {
                id: f.id,
                magnitude: mag,
                place: f
                    .properties
                    .place
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| "Unknown location".into()),
                time,
                severity: Severity::from_magnitude(mag),
            })
        })
        .filter(|q| q.magnitude >= min_magnitude)
        .collect();

    quakes.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
    quakes.truncate(limit);
    Ok(quakes)
}

pub async fn fetch_earthquakes(
    http: &dyn HttpClient,
    config: &EarthquakeConfig,
) -> Result<Vec<Earthquake>, FeedError> {
    let payload = http.get_json(&config.feed_url).await?;
    let quakes = parse_feed(&payload, config.min_magnitude, config.limit)?;
    tracing::debug!(count = quakes.len(), "earthquake feed parsed");
    Ok(quakes)
}

/// "Just now", "5 minutes ago", "3 hours ago", "2 days ago".
pub fn time_ago(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds().max(0);
    let (n, unit) = match secs {
        s if s < 60 => return "Just now".into(),
        s if s < 3600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3600, "hour"),
        s => (s / 86_400, "day"),
    };
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::ScriptedClient;
    use crate::http::FetchError;
    use chrono::Duration;
    use serde_json::json;

    fn feature(id: &str, mag: f64, place: &str) -> Value {
        json!({
            "id": id,
            "properties": {"mag": mag, "place": place, "time": 1_767_225_600_000i64}
        })
    }

    #[test]
    fn test_sorted_and_truncated() {
        let payload = json!({"features": [
            feature("a", 4.6, "off the coast of Chile"),
            feature("b", 6.9, "Kamchatka"),
            feature("c", 5.1, "Tonga"),
            feature("d", 4.8, "Fiji"),
        ]});
        let quakes = parse_feed(&payload, 4.0, 3).unwrap();
        let ids: Vec<&str> = quakes.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
        assert_eq!(quakes[0].severity, Severity::Severe);
    }

    #[test]
    fn test_below_threshold_dropped() {
        let payload = json!({"features": [feature("a", 3.9, "x"), feature("b", 4.0, "y")]});
        let quakes = parse_feed(&payload, 4.0, 5).unwrap();
        assert_eq!(quakes.len(), 1);
        assert_eq!(quakes[0].id, "b");
    }

    #[test]
    fn test_incomplete_features_skipped() {
        let payload = json!({"features": [
            {"id": "nomag", "properties": {"place": "x", "time": 0}},
            {"id": "noplace", "properties": {"mag": 5.0, "time": 0}}
        ]});
        let quakes = parse_feed(&payload, 4.0, 5).unwrap();
        assert_eq!(quakes.len(), 1);
        assert_eq!(quakes[0].place, "Unknown location");
    }

    #[test]
    fn test_empty_feed_is_ok() {
        assert!(parse_feed(&json!({"features": []}), 4.0, 5).unwrap().is_empty());
    }

    #[test]
    fn test_not_a_feature_collection() {
        assert!(matches!(parse_feed(&json!({"type": "x"}), 4.0, 5), Err(FeedError::Shape(_))));
    }

    #[test]
    fn test_severity_buckets() {
        assert_eq!(Severity::from_magnitude(4.4), Severity::Low);
        assert_eq!(Severity::from_magnitude(4.5), Severity::Medium);
        assert_eq!(Severity::from_magnitude(6.4), Severity::High);
        assert_eq!(Severity::from_magnitude(6.5), Severity::Severe);
    }

    #[test]
    fn test_time_ago() {
        let now = Utc::now();
        assert_eq!(time_ago(now, now - Duration::seconds(59)), "Just now");
        assert_eq!(time_ago(now, now - Duration::seconds(60)), "1 minute ago");
        assert_eq!(time_ago(now, now - Duration::minutes(42)), "42 minutes ago");
        assert_eq!(time_ago(now, now - Duration::hours(5)), "5 hours ago");
        assert_eq!(time_ago(now, now - Duration::days(2)), "2 days ago");
        assert_eq!(time_ago(now, now + Duration::minutes(3)), "Just now");
    }

    #[tokio::test]
    async fn test_fetch_propagates_status() {
        let config = EarthquakeConfig::default();
        let http = ScriptedClient::new().route(&config.feed_url, Err(FetchError::Status(500)));
        let err = fetch_earthquakes(&http, &config).await.unwrap_err();
        assert_eq!(err, FeedError::Fetch(FetchError::Status(500)));
    }
}
