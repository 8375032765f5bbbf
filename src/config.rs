//! Environment-sourced settings for the log connection and the consumption loop.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_BROKER: &str = "kafka:9092";
pub const DEFAULT_TOPIC: &str = "traffic-data";
pub const DEFAULT_GROUP_ID: &str = "analytics-processor";
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BATCH_SIZE: usize = 1;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `KAFKA_BROKER`, comma-separated.
    pub brokers: Vec<String>,
    /// `KAFKA_TOPIC_TRAFFIC`
    pub topic: String,
    /// `KAFKA_CONSUMER_GROUP`
    pub group_id: String,
    /// `PROCESSING_TIMEOUT`, in seconds. Bounds each fetch.
    pub processing_timeout: Duration,
    /// `BATCH_SIZE`. Read and reported, but the loop always handles one message at a time.
    pub batch_size: usize,
    /// `RETRY_BACKOFF_MS`. Pause after a failed fetch or a failed message.
    pub retry_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            brokers: vec![DEFAULT_BROKER.to_string()],
            topic: DEFAULT_TOPIC.to_string(),
            group_id: DEFAULT_GROUP_ID.to_string(),
            processing_timeout: Duration::from_secs(DEFAULT_PROCESSING_TIMEOUT_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl Config {
    /// Loads from the process environment. Unset or empty variables take their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let brokers = match get("KAFKA_BROKER") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(String::from)
                .collect(),
            None => vec![DEFAULT_BROKER.to_string()],
        };

        Ok(Self {
            brokers,
            topic: get("KAFKA_TOPIC_TRAFFIC").unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            group_id: get("KAFKA_CONSUMER_GROUP").unwrap_or_else(|| DEFAULT_GROUP_ID.to_string()),
            processing_timeout: Duration::from_secs(parse_or(
                &get,
                "PROCESSING_TIMEOUT",
                DEFAULT_PROCESSING_TIMEOUT_SECS,
            )?),
            batch_size: parse_or(&get, "BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            retry_backoff: Duration::from_millis(parse_or(
                &get,
                "RETRY_BACKOFF_MS",
                DEFAULT_RETRY_BACKOFF_MS,
            )?),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got '{raw}'")),
        None => Ok(default),
    }
}
