//! Counters and latency histogram for the consumption loop.

use std::time::Duration;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Observability handles for message processing.
///
/// Clones share the same underlying metrics, so a scrape handler can read
/// while the loop updates.
#[derive(Clone)]
pub struct MetricsRecorder {
    registry: Registry,
    messages_processed: IntCounter,
    messages_failed: IntCounter,
    commit_failures: IntCounter,
    processing_duration: Histogram,
}

impl MetricsRecorder {
    /// Creates the metrics in a fresh registry owned by this recorder.
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let messages_processed = IntCounter::new(
            "traffic_analytics_messages_processed_total",
            "Total messages processed",
        )?;
        let messages_failed = IntCounter::new(
            "traffic_analytics_messages_failed_total",
            "Total messages failed to process",
        )?;
        let commit_failures = IntCounter::new(
            "traffic_analytics_commit_failures_total",
            "Offset commits that failed after successful processing",
        )?;
        let processing_duration = Histogram::with_opts(HistogramOpts::new(
            "traffic_analytics_processing_duration_seconds",
            "Fetch and processing duration in seconds",
        ))?;

        registry.register(Box::new(messages_processed.clone()))?;
        registry.register(Box::new(messages_failed.clone()))?;
        registry.register(Box::new(commit_failures.clone()))?;
        registry.register(Box::new(processing_duration.clone()))?;

        Ok(Self {
            registry,
            messages_processed,
            messages_failed,
            commit_failures,
            processing_duration,
        })
    }

    pub fn increment_processed(&self) {
        self.messages_processed.inc();
    }

    pub fn increment_failed(&self) {
        self.messages_failed.inc();
    }

    pub fn increment_commit_failures(&self) {
        self.commit_failures.inc();
    }

    pub fn record_processing_time(&self, duration: Duration) {
        self.processing_duration.observe(duration.as_secs_f64());
    }

    pub fn processed(&self) -> u64 {
        self.messages_processed.get()
    }

    pub fn failed(&self) -> u64 {
        self.messages_failed.get()
    }

    pub fn commit_failures(&self) -> u64 {
        self.commit_failures.get()
    }

    pub fn observations(&self) -> u64 {
        self.processing_duration.get_sample_count()
    }

    /// Text exposition format, for an external scrape endpoint.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
