pub mod analytics;
pub mod backend;
pub mod config;
pub mod consumer;
pub mod error;
pub mod infra;
pub mod ingest;
pub mod output;
pub mod reading;
pub mod telemetry;
pub mod validate;
