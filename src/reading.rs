//! Traffic sensor readings as they arrive on the wire and travel through the log.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One sensor observation for a location.
///
/// Field names are the snake_case JSON keys used on the inbound API, in the
/// cache, and in the log payload. `timestamp` is unset when absent or when
/// it holds the year-1 zero instant (`0001-01-01T00:00:00Z`) some producers
/// send instead of omitting the field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrafficReading {
    pub location_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vehicle_count: i64,
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congestion_level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
}

impl TrafficReading {
    pub fn new(location_id: &str, timestamp: DateTime<Utc>, vehicle_count: i64, average_speed: f64) -> Self {
        TrafficReading {
            location_id: location_id.to_string(),
            timestamp: Some(timestamp),
            vehicle_count,
            average_speed,
            ..Default::default()
        }
    }

    pub fn with_congestion_level(mut self, level: &str) -> Self {
        self.congestion_level = Some(level.to_string());
        self
    }

    /// True when no real timestamp was supplied.
    pub fn timestamp_is_unset(&self) -> bool {
        match self.timestamp {
            None => true,
            Some(ts) => is_zero_instant(&ts),
        }
    }

    /// Parses the congestion level. Absent and empty strings both mean "not reported".
    pub fn congestion(&self) -> Result<Option<CongestionLevel>, ValidationError> {
        match self.congestion_level.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some),
        }
    }

    /// Cache key holding the most recent reading for this location.
    pub fn cache_key(&self) -> String {
        latest_reading_key(&self.location_id)
    }
}

/// Seconds between `0001-01-01T00:00:00Z` and the Unix epoch.
const ZERO_INSTANT_UNIX_SECS: i64 = -62_135_596_800;

fn is_zero_instant(ts: &DateTime<Utc>) -> bool {
    ts.timestamp() == ZERO_INSTANT_UNIX_SECS && ts.timestamp_subsec_nanos() == 0
}

pub fn latest_reading_key(location_id: &str) -> String {
    format!("latest_traffic:{location_id}")
}

/// Reported congestion bucket. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
    Severe,
}

impl CongestionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CongestionLevel::Low => "low",
            CongestionLevel::Medium => "medium",
            CongestionLevel::High => "high",
            CongestionLevel::Severe => "severe",
        }
    }
}

impl FromStr for CongestionLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(CongestionLevel::Low),
            "medium" => Ok(CongestionLevel::Medium),
            "high" => Ok(CongestionLevel::High),
            "severe" => Ok(CongestionLevel::Severe),
            other => Err(ValidationError::InvalidCongestionLevel(other.to_string())),
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_congestion_level_exact_match() {
        assert_eq!("low".parse::<CongestionLevel>(), Ok(CongestionLevel::Low));
        assert_eq!("severe".parse::<CongestionLevel>(), Ok(CongestionLevel::Severe));
        assert!("High".parse::<CongestionLevel>().is_err());
        assert!("urgent".parse::<CongestionLevel>().is_err());
    }

    #[test]
    fn test_empty_congestion_level_is_absent() {
        let reading = TrafficReading::default().with_congestion_level("");
        assert_eq!(reading.congestion(), Ok(None));
    }

    #[test]
    fn test_deserialize_minimal_payload() {
        let json = r#"{"location_id":"LOC001","timestamp":"2024-03-01T08:00:00Z","vehicle_count":42,"average_speed":55.5}"#;
        let reading: TrafficReading = serde_json::from_str(json).unwrap();

        assert_eq!(reading.location_id, "LOC001");
        assert_eq!(reading.vehicle_count, 42);
        assert_eq!(reading.average_speed, 55.5);
        assert_eq!(
            reading.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap())
        );
        assert!(reading.congestion_level.is_none());
        assert!(reading.occupancy.is_none());
    }

    #[test]
    fn test_missing_timestamp_is_unset() {
        let reading: TrafficReading =
            serde_json::from_str(r#"{"location_id":"LOC001","vehicle_count":1}"#).unwrap();
        assert!(reading.timestamp.is_none());
        assert!(reading.timestamp_is_unset());
    }

    #[test]
    fn test_year_one_timestamp_is_unset() {
        let reading: TrafficReading = serde_json::from_str(
            r#"{"location_id":"LOC001","timestamp":"0001-01-01T00:00:00Z","vehicle_count":1}"#,
        )
        .unwrap();
        assert!(reading.timestamp.is_some());
        assert!(reading.timestamp_is_unset());

        let one_nano_later = reading.timestamp.unwrap() + chrono::Duration::nanoseconds(1);
        let reading = TrafficReading::new("LOC001", one_nano_later, 1, 0.0);
        assert!(!reading.timestamp_is_unset());
    }

    #[test]
    fn test_unix_epoch_is_a_real_timestamp() {
        let reading = TrafficReading::new("LOC001", Utc.timestamp_opt(0, 0).unwrap(), 1, 0.0);
        assert!(!reading.timestamp_is_unset());
    }

    #[test]
    fn test_serialize_omits_absent_optionals() {
        let reading = TrafficReading::new("LOC002", Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(), 3, 20.0);
        let json = serde_json::to_string(&reading).unwrap();

        assert!(json.contains(r#""location_id":"LOC002""#));
        assert!(!json.contains("occupancy"));
        assert!(!json.contains("congestion_level"));
        assert!(json.contains(r#""timestamp":"2024-03-01T08:00:00Z""#));
    }

    #[test]
    fn test_cache_key() {
        let reading = TrafficReading::new("LOC003", Utc::now(), 0, 0.0);
        assert_eq!(reading.cache_key(), "latest_traffic:LOC003");
    }
}
