use bytes::Bytes;
use tracing::{debug, error};

use crate::backend::{Cache, ReadingStore};
use crate::error::DependencyError;
use crate::reading::{latest_reading_key, TrafficReading};

/// Writes a reading to the relational store, then to the latest-per-location cache entry.
///
/// The two writes are not atomic. A failed store write leaves the cache
/// untouched; a failed cache write after a successful store write is
/// reported, and the stored row stays.
pub struct DualWriter<S, C> {
    store: S,
    cache: C,
}

impl<S: ReadingStore, C: Cache> DualWriter<S, C> {
    pub fn new(store: S, cache: C) -> Self {
        Self { store, cache }
    }

    #[tracing::instrument(skip_all, fields(location_id = %reading.location_id))]
    pub async fn store(&self, reading: &TrafficReading) -> Result<(), DependencyError> {
        self.store.insert_reading(reading).await?;

        let value = serde_json::to_vec(reading).map_err(DependencyError::Encode)?;
        if let Err(e) = self.cache.set(&reading.cache_key(), Bytes::from(value)).await {
            error!(error = %e, "Reading stored but cache update failed");
            return Err(e);
        }

        debug!("Reading stored and cached");
        Ok(())
    }

    /// Most recent cached reading for a location, if any.
    pub async fn latest(&self, location_id: &str) -> Result<Option<TrafficReading>, DependencyError> {
        let Some(raw) = self.cache.get(&latest_reading_key(location_id)).await? else {
            return Ok(None);
        };
        let reading = serde_json::from_slice(&raw).map_err(|e| DependencyError::Cache(e.into()))?;
        Ok(Some(reading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{MemoryCache, MemoryStore};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct DownStore;

    #[async_trait]
    impl ReadingStore for DownStore {
        async fn insert_reading(&self, _: &TrafficReading) -> Result<(), DependencyError> {
            Err(DependencyError::Store("connection refused".into()))
        }
    }

    struct DownCache;

    #[async_trait]
    impl Cache for DownCache {
        async fn set(&self, _: &str, _: Bytes) -> Result<(), DependencyError> {
            Err(DependencyError::Cache("connection refused".into()))
        }

        async fn get(&self, _: &str) -> Result<Option<Bytes>, DependencyError> {
            Err(DependencyError::Cache("connection refused".into()))
        }
    }

    fn reading() -> TrafficReading {
        TrafficReading::new("LOC001", Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(), 100, 40.0)
    }

    #[tokio::test]
    async fn test_store_then_cache() {
        let store = MemoryStore::new();
        let cache = MemoryCache::new();
        let writer = DualWriter::new(store.clone(), cache.clone());

        writer.store(&reading()).await.unwrap();

        assert_eq!(store.readings(), vec![reading()]);
        let latest = writer.latest("LOC001").await.unwrap().unwrap();
        assert_eq!(latest.vehicle_count, 100);
        assert!(writer.latest("LOC999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_keeps_latest_per_location() {
        let cache = MemoryCache::new();
        let writer = DualWriter::new(MemoryStore::new(), cache.clone());

        let mut later = reading();
        later.vehicle_count = 7;
        writer.store(&reading()).await.unwrap();
        writer.store(&later).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(writer.latest("LOC001").await.unwrap().unwrap().vehicle_count, 7);
    }

    #[tokio::test]
    async fn test_store_failure_skips_cache() {
        let cache = MemoryCache::new();
        let writer = DualWriter::new(DownStore, cache.clone());

        let err = writer.store(&reading()).await.unwrap_err();

        assert!(matches!(err, DependencyError::Store(_)));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_failure_keeps_stored_row() {
        let store = MemoryStore::new();
        let writer = DualWriter::new(store.clone(), DownCache);

        let err = writer.store(&reading()).await.unwrap_err();

        assert!(matches!(err, DependencyError::Cache(_)));
        assert_eq!(store.readings().len(), 1);
    }
}
