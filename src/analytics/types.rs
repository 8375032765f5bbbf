//! Rows produced by the metric deriver and written to the analytics table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five metrics derived from every reading, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    CongestionIndex,
    TrafficDensity,
    FlowRate,
    TravelTime,
    DelayIndex,
}

impl MetricType {
    pub const ALL: [MetricType; 5] = [
        MetricType::CongestionIndex,
        MetricType::TrafficDensity,
        MetricType::FlowRate,
        MetricType::TravelTime,
        MetricType::DelayIndex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::CongestionIndex => "congestion_index",
            MetricType::TrafficDensity => "traffic_density",
            MetricType::FlowRate => "flow_rate",
            MetricType::TravelTime => "travel_time",
            MetricType::DelayIndex => "delay_index",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricType::CongestionIndex | MetricType::DelayIndex => "index",
            MetricType::TrafficDensity => "vehicles/km",
            MetricType::FlowRate => "vehicles/hour",
            MetricType::TravelTime => "minutes",
        }
    }

    /// Fixed confidence attached to every value of this type.
    pub fn confidence(&self) -> f64 {
        match self {
            MetricType::CongestionIndex => 0.95,
            MetricType::TrafficDensity => 0.90,
            MetricType::FlowRate | MetricType::DelayIndex => 0.85,
            MetricType::TravelTime => 0.80,
        }
    }
}

/// Direction label attached to the congestion index only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    /// | Congestion index | Trend      |
    /// |------------------|------------|
    /// | > 0.7            | increasing |
    /// | < 0.3            | decreasing |
    /// | otherwise        | stable     |
    pub fn from_congestion_index(index: f64) -> Self {
        match index {
            i if i > 0.7 => Trend::Increasing,
            i if i < 0.3 => Trend::Decreasing,
            _ => Trend::Stable,
        }
    }
}

/// One derived measurement covering a fixed window after the reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsMetric {
    pub analysis_timestamp: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub location_id: Option<String>,
    pub metric_type: MetricType,
    pub value: f64,
    pub unit: String,
    pub confidence_level: Option<f64>,
    pub trend: Option<Trend>,

    // nullable columns of the analytics table, never set by the deriver
    pub sample_size: Option<i64>,
    pub aggregation_method: Option<String>,
    pub metadata: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_boundaries() {
        assert_eq!(Trend::from_congestion_index(0.71), Trend::Increasing);
        assert_eq!(Trend::from_congestion_index(0.7), Trend::Stable);
        assert_eq!(Trend::from_congestion_index(0.5), Trend::Stable);
        assert_eq!(Trend::from_congestion_index(0.3), Trend::Stable);
        assert_eq!(Trend::from_congestion_index(0.29), Trend::Decreasing);
        assert_eq!(Trend::from_congestion_index(0.0), Trend::Decreasing);
    }

    #[test]
    fn test_metric_type_serializes_snake_case() {
        let json = serde_json::to_string(&MetricType::CongestionIndex).unwrap();
        assert_eq!(json, "\"congestion_index\"");
        assert_eq!(MetricType::FlowRate.as_str(), "flow_rate");
    }

    #[test]
    fn test_units_and_confidence() {
        assert_eq!(MetricType::TrafficDensity.unit(), "vehicles/km");
        assert_eq!(MetricType::FlowRate.unit(), "vehicles/hour");
        assert_eq!(MetricType::TravelTime.unit(), "minutes");
        assert_eq!(MetricType::DelayIndex.confidence(), 0.85);
        assert_eq!(MetricType::TravelTime.confidence(), 0.80);
    }
}
