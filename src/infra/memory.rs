use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;

use crate::analytics::AnalyticsMetric;
use crate::backend::{AnalyticsStore, Cache, ReadingStore};
use crate::error::{BoxError, DependencyError};
use crate::reading::TrafficReading;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, BoxError> {
    mutex.lock().map_err(|_| "lock poisoned".into())
}

#[derive(Default)]
struct Tables {
    readings: Vec<TrafficReading>,
    metrics: Vec<AnalyticsMetric>,
}

/// Relational store held in process memory. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readings(&self) -> Vec<TrafficReading> {
        lock(&self.tables)
            .map(|t| t.readings.clone())
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> Vec<AnalyticsMetric> {
        lock(&self.tables)
            .map(|t| t.metrics.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert_reading(&self, reading: &TrafficReading) -> Result<(), DependencyError> {
        let mut tables = lock(&self.tables).map_err(DependencyError::Store)?;
        tables.readings.push(reading.clone());
        Ok(())
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn insert_metric(&self, metric: &AnalyticsMetric) -> Result<(), DependencyError> {
        let mut tables = lock(&self.tables).map_err(DependencyError::Store)?;
        tables.metrics.push(metric.clone());
        Ok(())
    }
}

/// Cache held in process memory. Clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn set(&self, key: &str, value: Bytes) -> Result<(), DependencyError> {
        let mut entries = lock(&self.entries).map_err(DependencyError::Cache)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, DependencyError> {
        let entries = lock(&self.entries).map_err(DependencyError::Cache)?;
        Ok(entries.get(key).cloned())
    }
}
