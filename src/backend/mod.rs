//! Narrow interfaces to the relational store, the cache, and the durable log.
//!
//! The pipeline only talks to its backends through these traits. Wire
//! clients live elsewhere; [`crate::infra`] ships in-memory and CSV-backed
//! implementations.

use async_trait::async_trait;
use bytes::Bytes;

use crate::analytics::AnalyticsMetric;
use crate::error::{CommitError, DependencyError};
use crate::reading::TrafficReading;

/// The readings table: one row per ingested reading.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn insert_reading(&self, reading: &TrafficReading) -> Result<(), DependencyError>;
}

/// The analytics results table: one row per derived metric.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn insert_metric(&self, metric: &AnalyticsMetric) -> Result<(), DependencyError>;
}

/// Key/value cache. Entries never expire; a `set` overwrites.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn set(&self, key: &str, value: Bytes) -> Result<(), DependencyError>;

    /// Returns `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, DependencyError>;
}

/// Producer side of the durable log.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, payload: Bytes) -> Result<(), DependencyError>;
}

/// One record pulled from the log, with the position it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    pub offset: u64,
    pub payload: Bytes,
}

/// Consumer-group side of the durable log.
///
/// `fetch` returns the next uncommitted message and may wait for one to be
/// appended. Until `commit` succeeds for a message, later fetches hand the
/// same message back.
#[async_trait]
pub trait LogConsumer: Send + Sync {
    async fn fetch(&self) -> Result<LogMessage, DependencyError>;

    async fn commit(&self, message: &LogMessage) -> Result<(), CommitError>;
}
