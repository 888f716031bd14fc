//! Terminal view of a dashboard snapshot.

use super::{Panel, Snapshot};
use crate::feeds::earthquakes::time_ago;
use crate::location::format_coords;
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;

/// "3:04 PM" in `tz`, or in local time when no zone is configured.
pub fn format_time(t: DateTime<Utc>, tz: Option<Tz>) -> String {
    const FMT: &str = "%-I:%M %p";
    match tz {
        Some(tz) => t.with_timezone(&tz).format(FMT).to_string(),
        None => t.with_timezone(&Local).format(FMT).to_string(),
    }
}

pub fn render_text(snapshot: &Snapshot, tz: Option<Tz>, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    out.push_str("  \u{2554}\u{2550}\u{2550} Location\n");
    match &snapshot.location {
        Panel::Ready { data } => out.push_str(&format!("  \u{2551} {}\n", data.display_line())),
        Panel::Failed { message } => {
            out.push_str(&format!("  \u{2551} \u{26A0}\u{FE0F}  Location unavailable ({})\n", message));
            out.push_str("  \u{2551}    Retry with --location or POST /api/refresh\n");
        }
    }

    out.push_str(&format!(
        "  \u{2560}\u{2550}\u{2550} Earthquakes (M{:.1}+, past 24h)\n",
        snapshot.min_magnitude
    ));
    match &snapshot.earthquakes {
        Panel::Ready { data } if data.is_empty() => out.push_str(&format!(
            "  \u{2551} No significant earthquakes ({:.1}+) in the past 24 hours\n",
            snapshot.min_magnitude
        )),
        Panel::Ready { data } => {
            for q in data {
                out.push_str(&format!(
                    "  \u{2551} M{:<4.1} {:<9} {}  \u{00B7} {}\n",
                    q.magnitude,
                    format!("[{}]", q.severity),
                    q.place,
                    time_ago(now, q.time),
                ));
            }
        }
        Panel::Failed { .. } => out.push_str("  \u{2551} \u{26A0}\u{FE0F}  Unable to load earthquake data\n"),
    }

    out.push_str("  \u{2560}\u{2550}\u{2550} ISS\n");
    match &snapshot.iss {
        Panel::Ready { data } => {
            let over = data
                .over
                .as_deref()
                .map(|c| format!("over {}", c))
                .unwrap_or_else(|| "over the ocean".into());
            out.push_str(&format!(
                "  \u{2551} {} {}  \u{00B7} {:.0} km  \u{00B7} {:.0} km/h  \u{00B7} {}\n",
                format_coords(data.latitude, data.longitude),
                over,
                data.altitude_km,
                data.velocity_kmh,
                if data.visibility.is_empty() { "unknown" } else { data.visibility.as_str() },
            ));
        }
        Panel::Failed { .. } => out.push_str("  \u{2551} \u{26A0}\u{FE0F}  Unable to load ISS position\n"),
    }

    out.push_str(&format!(
        "  \u{255A}\u{2550}\u{2550} Last updated: {}\n",
        format_time(snapshot.updated_at, tz)
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::earthquakes::{Earthquake, Severity};
    use crate::feeds::iss::IssPosition;
    use crate::location::{LocationResult, ResolutionMethod};
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, h, m, 0).unwrap()
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            updated_at: at(15, 4),
            location: Panel::Ready {
                data: LocationResult {
                    city: "San Francisco".into(),
                    region: "California".into(),
                    country: "USA".into(),
                    postal_code: None,
                    latitude: Some(37.77),
                    longitude: Some(-122.42),
                    source_ip: None,
                    method: ResolutionMethod::DeviceSensor,
                    provider: None,
                },
            },
            earthquakes: Panel::Ready {
                data: vec![Earthquake {
                    id: "q1".into(),
                    magnitude: 6.1,
                    place: "Kermadec Islands".into(),
                    time: at(12, 4),
                    severity: Severity::High,
                }],
            },
            iss: Panel::Ready {
                data: IssPosition {
                    latitude: -12.5,
                    longitude: 130.8,
                    altitude_km: 418.2,
                    velocity_kmh: 27580.1,
                    visibility: "daylight".into(),
                    timestamp: at(15, 4),
                    over: Some("Australia".into()),
                },
            },
            min_magnitude: 4.0,
        }
    }

    #[test]
    fn test_format_time_in_zone() {
        assert_eq!(format_time(at(15, 4), Some(chrono_tz::UTC)), "3:04 PM");
        assert_eq!(format_time(at(9, 30), Some(chrono_tz::Asia::Tokyo)), "6:30 PM");
    }

    #[test]
    fn test_render_ready_panels() {
        let text = render_text(&snapshot(), Some(chrono_tz::UTC), at(15, 4));
        assert!(text.contains("San Francisco, California, USA"));
        assert!(text.contains("M6.1"));
        assert!(text.contains("[high]"));
        assert!(text.contains("3 hours ago"));
        assert!(text.contains("over Australia"));
        assert!(text.contains("Last updated: 3:04 PM"));
    }

    #[test]
    fn test_render_failures_and_empty() {
        let mut s = snapshot();
        s.location = Panel::Failed { message: "location unavailable after 4 attempt(s)".into() };
        s.earthquakes = Panel::Ready { data: vec![] };
        s.iss = Panel::Failed { message: "HTTP status 503".into() };

        let text = render_text(&s, Some(chrono_tz::UTC), at(15, 4));
        assert!(text.contains("Location unavailable"));
        assert!(text.contains("Retry"));
        assert!(text.contains("No significant earthquakes (4.0+)"));
        assert!(text.contains("Unable to load ISS position"));
    }
}
