use chrono::{DateTime, Duration, Utc};

use crate::analytics::types::{AnalyticsMetric, MetricType, Trend};
use crate::reading::TrafficReading;

/// Length of the window every metric covers, starting at the reading timestamp.
pub const WINDOW_MINUTES: i64 = 5;

/// Vehicle count treated as fully saturated for the congestion index.
const SATURATION_VEHICLE_COUNT: f64 = 200.0;

/// Free-flow speed in km/h used by the congestion and delay indices.
const FREE_FLOW_SPEED_KMH: f64 = 80.0;

/// Every reading is assumed to describe a 1 km road segment.
const SEGMENT_LENGTH_KM: f64 = 1.0;

/// Travel time reported when the average speed is not positive.
const STALLED_TRAVEL_TIME_MINUTES: f64 = 60.0;

/// Derives the five window metrics for `reading`, stamped with the current time.
pub fn derive_metrics(reading: &TrafficReading) -> [AnalyticsMetric; 5] {
    derive_metrics_at(reading, Utc::now())
}

/// Derives the five window metrics, using `analysed_at` as the analysis timestamp.
///
/// Callers are expected to have validated the reading; nothing here fails.
/// A reading without a timestamp gets a window starting at the Unix epoch.
pub fn derive_metrics_at(reading: &TrafficReading, analysed_at: DateTime<Utc>) -> [AnalyticsMetric; 5] {
    let period_start = reading.timestamp.unwrap_or_default();
    let period_end = period_start + Duration::minutes(WINDOW_MINUTES);

    MetricType::ALL.map(|metric_type| {
        let value = match metric_type {
            MetricType::CongestionIndex => congestion_index(reading),
            MetricType::TrafficDensity => traffic_density(reading),
            MetricType::FlowRate => flow_rate(reading),
            MetricType::TravelTime => travel_time(reading),
            MetricType::DelayIndex => delay_index(reading),
        };

        // an empty road short-circuits the index and reports no trend
        let trend = match metric_type {
            MetricType::CongestionIndex if reading.vehicle_count > 0 => {
                Some(Trend::from_congestion_index(value))
            }
            _ => None,
        };

        AnalyticsMetric {
            analysis_timestamp: analysed_at,
            period_start,
            period_end,
            location_id: Some(reading.location_id.clone()),
            metric_type,
            value,
            unit: metric_type.unit().to_string(),
            confidence_level: Some(metric_type.confidence()),
            trend,
            sample_size: None,
            aggregation_method: None,
            metadata: None,
        }
    })
}

/// Mean of the saturation ratio and the speed deficit against free flow, in [0, 1].
fn congestion_index(reading: &TrafficReading) -> f64 {
    if reading.vehicle_count == 0 {
        return 0.0;
    }

    let normalized_count = (reading.vehicle_count as f64 / SATURATION_VEHICLE_COUNT).min(1.0);
    let normalized_speed = if reading.average_speed > 0.0 {
        ((FREE_FLOW_SPEED_KMH - reading.average_speed) / FREE_FLOW_SPEED_KMH).max(0.0)
    } else {
        0.0
    };

    ((normalized_count + normalized_speed) / 2.0).clamp(0.0, 1.0)
}

/// Vehicles per km.
fn traffic_density(reading: &TrafficReading) -> f64 {
    reading.vehicle_count as f64 / SEGMENT_LENGTH_KM
}

/// Vehicles per hour, scaling the count observed over one window.
fn flow_rate(reading: &TrafficReading) -> f64 {
    reading.vehicle_count as f64 * (60.0 / WINDOW_MINUTES as f64)
}

/// Minutes to cross the segment.
fn travel_time(reading: &TrafficReading) -> f64 {
    if reading.average_speed > 0.0 {
        (SEGMENT_LENGTH_KM / reading.average_speed) * 60.0
    } else {
        STALLED_TRAVEL_TIME_MINUTES
    }
}

/// 0 means free flow, 1 means standstill relative to free-flow speed.
fn delay_index(reading: &TrafficReading) -> f64 {
    if reading.average_speed > 0.0 {
        ((FREE_FLOW_SPEED_KMH - reading.average_speed) / FREE_FLOW_SPEED_KMH).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(vehicle_count: i64, average_speed: f64) -> TrafficReading {
        TrafficReading::new(
            "LOC001",
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            vehicle_count,
            average_speed,
        )
    }

    fn value(metrics: &[AnalyticsMetric], metric_type: MetricType) -> f64 {
        metrics
            .iter()
            .find(|m| m.metric_type == metric_type)
            .map(|m| m.value)
            .unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    #[test]
    fn test_moderate_traffic() {
        let metrics = derive_metrics(&reading(100, 40.0));

        assert_close(value(&metrics, MetricType::CongestionIndex), 0.5);
        assert_eq!(metrics[0].trend, Some(Trend::Stable));
        assert_close(value(&metrics, MetricType::TrafficDensity), 100.0);
        assert_close(value(&metrics, MetricType::FlowRate), 1200.0);
        assert_close(value(&metrics, MetricType::TravelTime), 1.5);
        assert_close(value(&metrics, MetricType::DelayIndex), 0.5);
    }

    #[test]
    fn test_saturated_count_with_zero_speed() {
        let metrics = derive_metrics(&reading(250, 0.0));

        assert_close(value(&metrics, MetricType::CongestionIndex), 0.5);
        assert_close(value(&metrics, MetricType::TravelTime), 60.0);
        assert_eq!(value(&metrics, MetricType::DelayIndex), 0.0);
    }

    #[test]
    fn test_zero_vehicles_short_circuits_congestion() {
        for speed in [0.0, 10.0, 80.0, 120.0] {
            let metrics = derive_metrics(&reading(0, speed));
            let congestion = &metrics[0];

            assert_eq!(congestion.metric_type, MetricType::CongestionIndex);
            assert_eq!(congestion.value, 0.0);
            assert_eq!(congestion.confidence_level, Some(0.95));
            assert_eq!(congestion.trend, None);
        }
    }

    #[test]
    fn test_light_traffic_trend_decreasing() {
        let metrics = derive_metrics(&reading(1, 80.0));

        assert_close(value(&metrics, MetricType::CongestionIndex), 0.0025);
        assert_eq!(metrics[0].trend, Some(Trend::Decreasing));
    }

    #[test]
    fn test_fast_traffic_has_no_delay() {
        let metrics = derive_metrics(&reading(20, 110.0));

        assert_eq!(value(&metrics, MetricType::DelayIndex), 0.0);
        assert_close(value(&metrics, MetricType::CongestionIndex), 0.05);
    }

    #[test]
    fn test_heavy_congestion_trend_increasing() {
        let metrics = derive_metrics(&reading(200, 8.0));

        assert_close(value(&metrics, MetricType::CongestionIndex), 0.95);
        assert_eq!(metrics[0].trend, Some(Trend::Increasing));
    }

    #[test]
    fn test_only_congestion_carries_trend() {
        let metrics = derive_metrics(&reading(100, 40.0));
        for metric in &metrics[1..] {
            assert!(metric.trend.is_none(), "{:?} has a trend", metric.metric_type);
        }
    }

    #[test]
    fn test_window_and_metadata_shared() {
        let analysed_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let r = reading(10, 30.0);
        let metrics = derive_metrics_at(&r, analysed_at);

        let types: Vec<_> = metrics.iter().map(|m| m.metric_type).collect();
        assert_eq!(types, MetricType::ALL.to_vec());

        for metric in &metrics {
            assert_eq!(metric.analysis_timestamp, analysed_at);
            assert_eq!(Some(metric.period_start), r.timestamp);
            assert_eq!(metric.period_end, metric.period_start + Duration::minutes(5));
            assert_eq!(metric.location_id.as_deref(), Some("LOC001"));
            assert_eq!(metric.unit, metric.metric_type.unit());
            assert_eq!(metric.confidence_level, Some(metric.metric_type.confidence()));
        }
    }

    #[test]
    fn test_deterministic_for_fixed_analysis_time() {
        let analysed_at = Utc::now();
        let r = reading(73, 51.2);
        assert_eq!(derive_metrics_at(&r, analysed_at), derive_metrics_at(&r, analysed_at));
    }
}
