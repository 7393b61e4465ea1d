//! Storage module for persisting listings across runs
//!
//! This module handles everything the sink writes to disk:
//! - Record stores (JSON lines or SQLite), one record per listing id
//! - The persisted seen-id set
//! - Atomic file replacement

mod atomic;
mod jsonl;
mod schema;
mod seen_ids;
mod sqlite;
mod traits;

pub use jsonl::JsonLinesStore;
pub use schema::{initialize_schema, SCHEMA_SQL, SCHEMA_VERSION};
pub use seen_ids::SeenIdSet;
pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StorageError, StorageResult};

use crate::config::{OutputConfig, OutputFormat};
use std::path::Path;

/// Opens the record store selected by the output configuration
///
/// # Arguments
///
/// * `config` - Output section of the configuration
///
/// # Returns
///
/// * `Ok(Box<dyn RecordStore>)` - The opened store
/// * `Err(StorageError)` - Failed to open or index the store
pub fn open_store(config: &OutputConfig) -> StorageResult<Box<dyn RecordStore>> {
    let path = Path::new(&config.records_path);
    let store: Box<dyn RecordStore> = match config.format {
        OutputFormat::Jsonl => Box::new(JsonLinesStore::open(path)?),
        OutputFormat::Sqlite => Box::new(SqliteStore::open(path)?),
    };
    tracing::info!("Record store: {}", store.describe());
    Ok(store)
}
