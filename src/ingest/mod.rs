//! Inbound path: validate a reading, store it, publish it.
//!
//! [`IngestionFlow::ingest`] is what the external request layer calls once
//! per inbound reading. Stages run in order and the first failure is
//! returned as is. Completed stages are never undone, so a reading can end
//! up stored and cached but never published when the log append fails.

mod dual_write;
mod publish;

pub use dual_write::DualWriter;
pub use publish::Publisher;

use tracing::{info, warn};

use crate::backend::{Cache, EventLog, ReadingStore};
use crate::error::{DependencyError, IngestError};
use crate::reading::TrafficReading;
use crate::validate::validate_inbound;

pub struct IngestionFlow<S, C, L> {
    writer: DualWriter<S, C>,
    publisher: Publisher<L>,
}

impl<S, C, L> IngestionFlow<S, C, L>
where
    S: ReadingStore,
    C: Cache,
    L: EventLog,
{
    pub fn new(store: S, cache: C, log: L) -> Self {
        Self {
            writer: DualWriter::new(store, cache),
            publisher: Publisher::new(log),
        }
    }

    /// Validate → store + cache → publish. Returns once the log append succeeded.
    #[tracing::instrument(skip_all, fields(location_id = %reading.location_id))]
    pub async fn ingest(&self, reading: &TrafficReading) -> Result<(), IngestError> {
        if let Err(e) = validate_inbound(reading) {
            warn!(error = %e, "Rejected reading");
            return Err(e.into());
        }

        self.writer.store(reading).await?;

        if let Err(e) = self.publisher.publish(reading).await {
            // stored and cached, but the analytics path will never see it
            warn!(error = %e, "Reading stored but not published");
            return Err(e.into());
        }

        info!("Reading ingested");
        Ok(())
    }

    /// Most recent reading seen for a location, served from the cache.
    pub async fn latest(&self, location_id: &str) -> Result<Option<TrafficReading>, DependencyError> {
        self.writer.latest(location_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::infra::{MemoryCache, MemoryLog, MemoryStore};
    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};

    struct DownLog;

    #[async_trait]
    impl EventLog for DownLog {
        async fn append(&self, _: Bytes) -> Result<(), DependencyError> {
            Err(DependencyError::Log("no brokers available".into()))
        }
    }

    fn reading() -> TrafficReading {
        TrafficReading::new("LOC001", Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(), 100, 40.0)
            .with_congestion_level("medium")
    }

    #[tokio::test]
    async fn test_ingest_reaches_every_backend() {
        let (store, cache, log) = (MemoryStore::new(), MemoryCache::new(), MemoryLog::new("traffic-data"));
        let flow = IngestionFlow::new(store.clone(), cache.clone(), log.clone());

        flow.ingest(&reading()).await.unwrap();

        assert_eq!(store.readings().len(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(log.len(), 1);
        assert_eq!(flow.latest("LOC001").await.unwrap(), Some(reading()));
    }

    #[tokio::test]
    async fn test_invalid_congestion_level_writes_nothing() {
        let (store, cache, log) = (MemoryStore::new(), MemoryCache::new(), MemoryLog::new("traffic-data"));
        let flow = IngestionFlow::new(store.clone(), cache.clone(), log.clone());

        let err = flow
            .ingest(&reading().with_congestion_level("urgent"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Validation(ValidationError::InvalidCongestionLevel(ref level)) if level == "urgent"
        ));
        assert_eq!(err.status_code(), 400);
        assert!(store.readings().is_empty());
        assert!(cache.is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_missing_timestamp_rejected() {
        let store = MemoryStore::new();
        let flow = IngestionFlow::new(store.clone(), MemoryCache::new(), MemoryLog::new("t"));

        let mut r = reading();
        r.timestamp = None;
        let err = flow.ingest(&r).await.unwrap_err();

        assert!(matches!(err, IngestError::Validation(ValidationError::MissingTimestamp)));
        assert!(store.readings().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_reading_stored() {
        let (store, cache) = (MemoryStore::new(), MemoryCache::new());
        let flow = IngestionFlow::new(store.clone(), cache.clone(), DownLog);

        let err = flow.ingest(&reading()).await.unwrap_err();

        assert!(matches!(err, IngestError::Dependency(DependencyError::Log(_))));
        assert_eq!(err.status_code(), 500);
        assert_eq!(store.readings().len(), 1);
        assert_eq!(cache.len(), 1);
    }
}
