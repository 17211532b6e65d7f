use chrono::{DateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One parking facility. Every field is optional because the remote
/// documents are not guaranteed to carry any of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParkingLot {
    /// Last path segment of the remote document name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_spots: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_spots: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_ev_spots: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fare_per_day: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_time: Option<String>,
}

impl ParkingLot {
    /// Map position, with missing coordinates at 0.
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.latitude.unwrap_or(0.0), self.longitude.unwrap_or(0.0))
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }

    /// Whether the lot is open at `time`, or `None` if the hours are unknown.
    ///
    /// A close time earlier than the open time means the window wraps past
    /// midnight. Equal times mean the lot never closes.
    pub fn is_open_at(&self, time: NaiveTime) -> Option<bool> {
        let open = parse_time_of_day(self.open_time.as_deref()?)?;
        let close = parse_time_of_day(self.close_time.as_deref()?)?;

        let open_now = if open == close {
            true
        } else if open < close {
            open <= time && time < close
        } else {
            time >= open || time < close
        };
        Some(open_now)
    }
}

/// Accepts `HH:MM`, `HH:MM:SS` or an RFC 3339 timestamp (time of day in its
/// own offset).
fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.time()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hours(open: &str, close: &str) -> ParkingLot {
        ParkingLot {
            open_time: Some(open.to_string()),
            close_time: Some(close.to_string()),
            ..Default::default()
        }
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // ---- JSON encoding ----

    #[test]
    fn test_json_uses_camel_case_and_skips_missing() {
        let lot = ParkingLot {
            name: Some("Lot A".into()),
            available_ev_spots: Some(3),
            fare_per_day: Some(12000),
            ..Default::default()
        };
        let json = serde_json::to_string(&lot).unwrap();
        assert_eq!(
            json,
            r#"{"name":"Lot A","availableEvSpots":3,"farePerDay":12000}"#
        );
    }

    #[test]
    fn test_json_missing_fields_default_to_none() {
        let lot: ParkingLot = serde_json::from_str(r#"{"city":"Bogota"}"#).unwrap();
        assert_eq!(lot.city.as_deref(), Some("Bogota"));
        assert!(lot.name.is_none());
        assert!(lot.latitude.is_none());
    }

    #[test]
    fn test_json_accepts_null_fields() {
        let lot: ParkingLot =
            serde_json::from_str(r#"{"name":null,"latitude":4.6,"totalSpots":null}"#).unwrap();
        assert!(lot.name.is_none());
        assert_eq!(lot.latitude, Some(4.6));
    }

    // ---- Display helpers ----

    #[test]
    fn test_position_defaults_to_origin() {
        let lot = ParkingLot {
            latitude: Some(4.6),
            ..Default::default()
        };
        assert_eq!(lot.position(), Coordinate::new(4.6, 0.0));
        assert_eq!(ParkingLot::default().position(), Coordinate::default());
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(ParkingLot::default().display_name(), "Unknown");
    }

    // ---- Opening hours ----

    #[test]
    fn test_open_during_day_window() {
        let lot = hours("06:00", "22:00");
        assert_eq!(lot.is_open_at(at(6, 0)), Some(true));
        assert_eq!(lot.is_open_at(at(21, 59)), Some(true));
        assert_eq!(lot.is_open_at(at(22, 0)), Some(false));
        assert_eq!(lot.is_open_at(at(3, 0)), Some(false));
    }

    #[test]
    fn test_open_window_wraps_midnight() {
        let lot = hours("22:00", "06:00");
        assert_eq!(lot.is_open_at(at(23, 30)), Some(true));
        assert_eq!(lot.is_open_at(at(2, 0)), Some(true));
        assert_eq!(lot.is_open_at(at(12, 0)), Some(false));
    }

    #[test]
    fn test_equal_times_mean_always_open() {
        assert_eq!(hours("00:00", "00:00").is_open_at(at(15, 0)), Some(true));
    }

    #[test]
    fn test_timestamp_hours_use_time_of_day() {
        let lot = hours("2024-09-01T07:30:00Z", "2024-09-01T19:00:00Z");
        assert_eq!(lot.is_open_at(at(8, 0)), Some(true));
        assert_eq!(lot.is_open_at(at(20, 0)), Some(false));
    }

    #[test]
    fn test_unknown_hours() {
        assert_eq!(ParkingLot::default().is_open_at(at(8, 0)), None);
        assert_eq!(hours("morning", "22:00").is_open_at(at(8, 0)), None);
    }
}
