//! Bundled backend implementations.
//!
//! [`MemoryStore`], [`MemoryCache`] and [`MemoryLog`] keep everything in
//! process memory; [`CsvStore`] persists both tables as CSV files.

mod csv_store;
mod log;
mod memory;

pub use csv_store::{CsvStore, ANALYTICS_FILE, READINGS_FILE};
pub use log::{MemoryLog, MemoryLogConsumer};
pub use memory::{MemoryCache, MemoryStore};
