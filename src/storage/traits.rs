//! Storage traits and error types
//!
//! This module defines the record store interface the sink writes through,
//! and the errors shared by every storage backend.

use crate::listing::{Listing, ListingId, ListingStatus};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to replace {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("Listing {0} is not in the store")]
    NotFound(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A keyed, append-or-replace store of flattened listing records
///
/// Implementations hold at most one record per listing id.
pub trait RecordStore: Send {
    /// Content fingerprint of the stored record, if the id is present
    fn fingerprint(&self, id: &ListingId) -> StorageResult<Option<String>>;

    /// Lifecycle status of the stored record, if the id is present
    fn status(&self, id: &ListingId) -> StorageResult<Option<ListingStatus>>;

    /// Appends a record for an id that is not stored yet
    fn insert(&mut self, listing: &Listing) -> StorageResult<()>;

    /// Replaces the stored record for an id in place
    fn replace(&mut self, listing: &Listing) -> StorageResult<()>;

    /// Number of stored records
    fn count(&self) -> StorageResult<u64>;

    /// Stored records grouped by listing status
    fn count_by_status(&self) -> StorageResult<BTreeMap<String, u64>>;

    /// Human-readable backend description for logs
    fn describe(&self) -> String;
}

impl<T: RecordStore + ?Sized> RecordStore for Box<T> {
    fn fingerprint(&self, id: &ListingId) -> StorageResult<Option<String>> {
        (**self).fingerprint(id)
    }

    fn status(&self, id: &ListingId) -> StorageResult<Option<ListingStatus>> {
        (**self).status(id)
    }

    fn insert(&mut self, listing: &Listing) -> StorageResult<()> {
        (**self).insert(listing)
    }

    fn replace(&mut self, listing: &Listing) -> StorageResult<()> {
        (**self).replace(listing)
    }

    fn count(&self) -> StorageResult<u64> {
        (**self).count()
    }

    fn count_by_status(&self) -> StorageResult<BTreeMap<String, u64>> {
        (**self).count_by_status()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
