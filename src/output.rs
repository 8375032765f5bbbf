//! Output formatting and persistence for readings and derived metrics.
//!
//! Supports pretty-printed JSON logging and CSV append.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs any serializable record as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: impl AsRef<Path>, record: &impl Serialize) -> Result<()> {
    let path = path.as_ref();
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}
