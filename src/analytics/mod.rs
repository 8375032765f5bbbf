//! Per-reading traffic analytics.
//!
//! Every validated reading yields five metrics covering the five minutes
//! after its timestamp: congestion index, traffic density, flow rate, travel
//! time and delay index. Road geometry is not known here, so each reading is
//! treated as describing a 1 km segment with an 80 km/h free-flow speed.

pub mod derive;
pub mod types;

pub use derive::{derive_metrics, derive_metrics_at, WINDOW_MINUTES};
pub use types::{AnalyticsMetric, MetricType, Trend};
