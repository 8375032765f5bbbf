//! Consumption path: fetch a reading from the log, derive its metrics, store them, commit.
//!
//! The loop is an explicit state machine driven one transition at a time by
//! [`ConsumptionLoop::step`]:
//!
//! ```text
//! Idle → Fetching → Processing → Committing → Idle
//!           │            │
//!           └────────────┴──→ Backoff → Idle
//! ```
//!
//! `Stopped` is reached from `Idle`, `Fetching` or `Backoff` once the
//! cancellation token fires. Messages are handled strictly one at a time and
//! a message is committed only after all of its metrics were stored, so
//! delivery is at-least-once. A message that keeps failing is retried
//! forever; there is no dead-letter path.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::analytics::derive_metrics;
use crate::backend::{AnalyticsStore, LogConsumer, LogMessage};
use crate::config::Config;
use crate::error::{FetchError, ProcessError, ValidationError};
use crate::reading::TrafficReading;
use crate::telemetry::MetricsRecorder;
use crate::validate::validate;

/// Timing knobs for the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    /// Upper bound on a single fetch.
    pub fetch_timeout: Duration,
    /// Fixed pause after a failed fetch or a failed message.
    pub retry_backoff: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for LoopSettings {
    fn from(config: &Config) -> Self {
        Self {
            fetch_timeout: config.processing_timeout,
            retry_backoff: config.retry_backoff,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Idle,
    Fetching,
    Processing {
        message: LogMessage,
        fetch_started: Instant,
    },
    Committing {
        message: LogMessage,
        fetch_started: Instant,
    },
    Backoff,
    Stopped,
}

pub struct ConsumptionLoop<C, S> {
    consumer: C,
    store: S,
    recorder: MetricsRecorder,
    settings: LoopSettings,
}

impl<C, S> ConsumptionLoop<C, S>
where
    C: LogConsumer,
    S: AnalyticsStore,
{
    pub fn new(consumer: C, store: S, recorder: MetricsRecorder, settings: LoopSettings) -> Self {
        Self {
            consumer,
            store,
            recorder,
            settings,
        }
    }

    /// Drives the state machine until `cancel` fires.
    ///
    /// Cancellation is honoured between messages, while waiting on a fetch,
    /// and during backoff. A message whose metrics are being stored is never
    /// interrupted, and one that was not committed is redelivered later.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            fetch_timeout_secs = self.settings.fetch_timeout.as_secs_f64(),
            "Starting analytics processing loop"
        );

        let mut state = LoopState::Idle;
        while state != LoopState::Stopped {
            state = self.step(state, &cancel).await;
        }

        info!(
            processed = self.recorder.processed(),
            failed = self.recorder.failed(),
            "Analytics processing loop stopped"
        );
    }

    /// Performs one transition.
    pub async fn step(&self, state: LoopState, cancel: &CancellationToken) -> LoopState {
        match state {
            LoopState::Idle => {
                if cancel.is_cancelled() {
                    LoopState::Stopped
                } else {
                    LoopState::Fetching
                }
            }
            LoopState::Fetching => {
                let fetch_started = Instant::now();
                match self.fetch(cancel).await {
                    None => LoopState::Stopped,
                    Some(Ok(message)) => LoopState::Processing {
                        message,
                        fetch_started,
                    },
                    Some(Err(e)) => {
                        warn!(error = %e, "Fetch failed, backing off");
                        LoopState::Backoff
                    }
                }
            }
            LoopState::Processing {
                message,
                fetch_started,
            } => {
                let outcome = self.process(&message).await;
                match outcome {
                    Ok(()) => LoopState::Committing {
                        message,
                        fetch_started,
                    },
                    Err(e) => {
                        self.recorder.increment_failed();
                        error!(offset = message.offset, error = %e, "Message processing failed, leaving offset uncommitted");
                        LoopState::Backoff
                    }
                }
            }
            LoopState::Committing {
                message,
                fetch_started,
            } => {
                self.recorder.increment_processed();
                self.recorder.record_processing_time(fetch_started.elapsed());

                if let Err(e) = self.consumer.commit(&message).await {
                    self.recorder.increment_commit_failures();
                    warn!(offset = message.offset, error = %e, "Error committing message");
                } else {
                    debug!(offset = message.offset, "Committed message");
                }
                LoopState::Idle
            }
            LoopState::Backoff => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => LoopState::Stopped,
                    _ = tokio::time::sleep(self.settings.retry_backoff) => LoopState::Idle,
                }
            }
            LoopState::Stopped => LoopState::Stopped,
        }
    }

    /// Waits for the next message. `None` means cancellation won the race.
    async fn fetch(&self, cancel: &CancellationToken) -> Option<Result<LogMessage, FetchError>> {
        let timeout = self.settings.fetch_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(timeout, self.consumer.fetch()) => Some(match result {
                Ok(fetched) => fetched.map_err(FetchError::from),
                Err(_) => Err(FetchError::Timeout(timeout)),
            }),
        }
    }

    /// Decodes, re-validates, derives and stores the metrics for one message.
    ///
    /// Metrics are stored one by one; rows written before a failing insert
    /// stay, so a retried message can produce duplicates.
    #[tracing::instrument(skip_all, fields(offset = message.offset))]
    pub async fn process(&self, message: &LogMessage) -> Result<(), ProcessError> {
        let reading: TrafficReading = serde_json::from_slice(&message.payload)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;

        debug!(location_id = %reading.location_id, timestamp = ?reading.timestamp, "Processing traffic reading");
        validate(&reading)?;

        for metric in &derive_metrics(&reading) {
            self.store.insert_metric(metric).await?;
        }

        info!(location_id = %reading.location_id, "Stored analytics for reading");
        Ok(())
    }
}
