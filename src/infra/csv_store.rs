use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::AnalyticsMetric;
use crate::backend::{AnalyticsStore, ReadingStore};
use crate::error::DependencyError;
use crate::output::append_record;
use crate::reading::TrafficReading;

pub const READINGS_FILE: &str = "readings.csv";
pub const ANALYTICS_FILE: &str = "analytics.csv";

/// Flat readings row. Every column is always written so rows line up with the header.
#[derive(Serialize)]
struct ReadingRow {
    location_id: String,
    timestamp: Option<DateTime<Utc>>,
    vehicle_count: i64,
    average_speed: f64,
    congestion_level: Option<String>,
    max_speed: Option<f64>,
    min_speed: Option<f64>,
    occupancy: Option<f64>,
    queue_length: Option<f64>,
    travel_time: Option<f64>,
    data_source: Option<String>,
}

impl From<&TrafficReading> for ReadingRow {
    fn from(r: &TrafficReading) -> Self {
        ReadingRow {
            location_id: r.location_id.clone(),
            timestamp: r.timestamp,
            vehicle_count: r.vehicle_count,
            average_speed: r.average_speed,
            congestion_level: r.congestion_level.clone(),
            max_speed: r.max_speed,
            min_speed: r.min_speed,
            occupancy: r.occupancy,
            queue_length: r.queue_length,
            travel_time: r.travel_time,
            data_source: r.data_source.clone(),
        }
    }
}

/// Relational store stand-in that appends rows to `readings.csv` and
/// `analytics.csv` under one directory.
#[derive(Clone)]
pub struct CsvStore {
    dir: PathBuf,
    // serializes appends so concurrent requests never interleave rows
    write_lock: Arc<Mutex<()>>,
}

impl CsvStore {
    /// Creates the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn readings_path(&self) -> PathBuf {
        self.dir.join(READINGS_FILE)
    }

    pub fn analytics_path(&self) -> PathBuf {
        self.dir.join(ANALYTICS_FILE)
    }

    /// Appends one row on the blocking pool so file I/O never stalls the runtime.
    async fn append<R>(&self, path: PathBuf, record: R) -> Result<(), DependencyError>
    where
        R: Serialize + Send + 'static,
    {
        let write_lock = Arc::clone(&self.write_lock);
        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let _guard = write_lock
                .lock()
                .map_err(|_| anyhow::anyhow!("csv write lock poisoned"))?;
            append_record(path, &record)
        })
        .await
        .map_err(|e| DependencyError::Store(e.into()))?
        .map_err(|e| DependencyError::Store(e.into()))
    }
}

#[async_trait]
impl ReadingStore for CsvStore {
    async fn insert_reading(&self, reading: &TrafficReading) -> Result<(), DependencyError> {
        self.append(self.readings_path(), ReadingRow::from(reading)).await
    }
}

#[async_trait]
impl AnalyticsStore for CsvStore {
    async fn insert_metric(&self, metric: &AnalyticsMetric) -> Result<(), DependencyError> {
        self.append(self.analytics_path(), metric.clone()).await
    }
}
