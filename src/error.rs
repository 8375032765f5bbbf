//! Error taxonomy for the ingestion and consumption paths.
//!
//! Validation failures are the caller's fault and map to client errors;
//! dependency failures come from the store, cache, or log and map to server
//! errors. A failed offset commit is its own type because the loop only ever
//! logs it.

use std::time::Duration;

use thiserror::Error;

/// Boxed source error produced by a backend client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A reading broke one of the field rules. Only the first violated rule is reported.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("location_id is required")]
    MissingLocation,

    #[error("vehicle_count must be non-negative, got {0}")]
    NegativeVehicleCount(i64),

    #[error("average_speed must be non-negative, got {0:.2}")]
    NegativeAverageSpeed(f64),

    #[error("invalid congestion_level: {0}")]
    InvalidCongestionLevel(String),

    #[error("timestamp is required")]
    MissingTimestamp,

    #[error("{field} must be non-negative, got {value:.2}")]
    NegativeSpeedBound { field: &'static str, value: f64 },

    #[error("occupancy must be between 0 and 100, got {0:.2}")]
    OccupancyOutOfRange(f64),

    #[error("malformed reading payload: {0}")]
    Malformed(String),
}

/// The relational store, cache, or log could not complete a call.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("relational store error: {0}")]
    Store(#[source] BoxError),

    #[error("cache error: {0}")]
    Cache(#[source] BoxError),

    #[error("event log error: {0}")]
    Log(#[source] BoxError),

    #[error("failed to encode reading: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Advancing the consumer group offset failed after a message was fully processed.
#[derive(Debug, Error)]
#[error("offset commit failed at offset {offset}: {source}")]
pub struct CommitError {
    pub offset: u64,
    #[source]
    pub source: BoxError,
}

/// Failure of the inbound validate, store, publish sequence.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

impl IngestError {
    /// HTTP status the external request layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            IngestError::Validation(_) => 400,
            IngestError::Dependency(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, IngestError::Validation(_))
    }
}

/// A fetched message could not be turned into stored metrics.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to store analytics result: {0}")]
    Dependency(#[from] DependencyError),
}

/// The next message could not be pulled from the log.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Dependency(#[from] DependencyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_status_codes() {
        let validation = IngestError::from(ValidationError::MissingLocation);
        assert_eq!(validation.status_code(), 400);
        assert!(validation.is_client_error());

        let dependency = IngestError::from(DependencyError::Store("down".into()));
        assert_eq!(dependency.status_code(), 500);
        assert!(!dependency.is_client_error());
    }

    #[test]
    fn test_validation_messages_name_the_rule() {
        let err = ValidationError::InvalidCongestionLevel("urgent".to_string());
        assert_eq!(err.to_string(), "invalid congestion_level: urgent");

        let err = ValidationError::NegativeAverageSpeed(-1.5);
        assert_eq!(err.to_string(), "average_speed must be non-negative, got -1.50");
    }

    #[test]
    fn test_commit_error_carries_offset() {
        let err = CommitError {
            offset: 7,
            source: "broker gone".into(),
        };
        assert_eq!(err.to_string(), "offset commit failed at offset 7: broker gone");
    }
}
