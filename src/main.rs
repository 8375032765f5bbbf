//! CLI entry point for the traffic analytics pipeline.
//!
//! Provides subcommands for deriving the metrics of a single reading and for
//! running the full ingest → log → analytics pipeline over a file of readings.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use traffic_analytics::{
    analytics::derive_metrics,
    backend::{Cache, EventLog, ReadingStore},
    config::Config,
    consumer::{ConsumptionLoop, LoopSettings},
    infra::{CsvStore, MemoryCache, MemoryLog},
    ingest::IngestionFlow,
    output::print_json,
    reading::TrafficReading,
    telemetry::MetricsRecorder,
    validate::validate_inbound,
};

#[derive(Parser)]
#[command(name = "traffic_analytics")]
#[command(about = "Ingest traffic sensor readings and derive congestion analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one reading and print its derived metrics
    Derive {
        /// Path to a JSON file holding a single reading
        #[arg(value_name = "FILE")]
        source: String,
    },
    /// Ingest readings and run the analytics consumer until Ctrl+C
    Run {
        /// JSON-lines file of readings to ingest
        #[arg(short, long)]
        input: String,

        /// Directory for readings.csv and analytics.csv
        #[arg(short, long, default_value = "data")]
        output_dir: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/traffic_analytics.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("traffic_analytics.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Derive { source } => {
            let raw = std::fs::read(&source).with_context(|| format!("reading {source}"))?;
            let reading: TrafficReading = serde_json::from_slice(&raw)?;
            validate_inbound(&reading)?;

            print_json(&derive_metrics(&reading))?;
        }
        Commands::Run { input, output_dir } => {
            run_pipeline(&input, &output_dir).await?;
        }
    }

    Ok(())
}

/// Wires CSV-backed tables, an in-memory cache and log, and the consumer,
/// then feeds every reading in `input` through the ingestion flow.
#[tracing::instrument]
async fn run_pipeline(input: &str, output_dir: &str) -> Result<()> {
    let config = Config::from_env()?;
    info!(
        brokers = ?config.brokers,
        processing_timeout_secs = config.processing_timeout.as_secs(),
        "Configuration loaded"
    );
    if config.batch_size != 1 {
        warn!(
            batch_size = config.batch_size,
            "BATCH_SIZE is ignored, messages are processed one at a time"
        );
    }

    let store = CsvStore::open(output_dir)?;
    let cache = MemoryCache::new();
    let log = MemoryLog::new(&config.topic);
    let recorder = MetricsRecorder::new()?;

    let log_consumer = log.consumer(&config.group_id);
    info!(
        topic = log.topic(),
        group_id = log_consumer.group_id(),
        "Joined consumer group"
    );

    let consumption = ConsumptionLoop::new(
        log_consumer,
        store.clone(),
        recorder.clone(),
        LoopSettings::from(&config),
    );
    let cancel = CancellationToken::new();
    let consumer_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { consumption.run(cancel).await }
    });

    let flow = IngestionFlow::new(store, cache, log);
    let (accepted, rejected) = ingest_file(&flow, input).await?;
    info!(accepted, rejected, "Input ingested. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    cancel.cancel();
    consumer_task.await?;

    info!("{}", recorder.render()?);
    Ok(())
}

/// Ingests each non-empty line of a JSON-lines file, returning (accepted, rejected) counts.
async fn ingest_file<S, C, L>(flow: &IngestionFlow<S, C, L>, path: &str) -> Result<(usize, usize)>
where
    S: ReadingStore,
    C: Cache,
    L: EventLog,
{
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let mut accepted = 0;
    let mut rejected = 0;

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let reading: TrafficReading = match serde_json::from_str(line) {
            Ok(reading) => reading,
            Err(e) => {
                warn!(line = line_no + 1, status = 400, error = %e, "Unparseable reading");
                rejected += 1;
                continue;
            }
        };

        match flow.ingest(&reading).await {
            Ok(()) => accepted += 1,
            Err(e) => {
                if e.is_client_error() {
                    warn!(line = line_no + 1, status = e.status_code(), error = %e, "Reading rejected");
                } else {
                    error!(line = line_no + 1, status = e.status_code(), error = %e, "Reading not ingested");
                }
                rejected += 1;
            }
        }
    }

    Ok((accepted, rejected))
}
