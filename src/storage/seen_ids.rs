//! Persisted set of listing ids already stored
//!
//! Saved as a pretty-printed JSON array in insertion order. A missing file
//! means a first run; a file that does not parse is an error, since starting
//! from an empty set would re-emit every listing ever stored.

use crate::listing::ListingId;
use crate::storage::atomic::write_atomic;
use crate::storage::traits::{StorageError, StorageResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SeenIdSet {
    path: PathBuf,
    order: Vec<String>,
    ids: HashSet<String>,
    dirty: bool,
}

impl SeenIdSet {
    pub fn load(path: &Path) -> StorageResult<Self> {
        let mut set = Self {
            path: path.to_path_buf(),
            order: Vec::new(),
            ids: HashSet::new(),
            dirty: false,
        };

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No seen-id file at {}, starting empty", path.display());
                return Ok(set);
            }
            Err(e) => return Err(e.into()),
        };

        let ids: Vec<String> =
            serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        for id in ids {
            if set.ids.insert(id.clone()) {
                set.order.push(id);
            }
        }

        tracing::info!("Loaded {} seen ids from {}", set.len(), path.display());
        Ok(set)
    }

    pub fn contains(&self, id: &ListingId) -> bool {
        self.ids.contains(id.as_str())
    }

    /// Adds an id; returns false if it was already present
    pub fn insert(&mut self, id: &ListingId) -> bool {
        if !self.ids.insert(id.to_string()) {
            return false;
        }
        self.order.push(id.to_string());
        self.dirty = true;
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Writes the set to disk atomically
    pub fn flush(&mut self) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(&self.order)?;
        write_atomic(&self.path, json.as_bytes())?;
        self.dirty = false;
        tracing::debug!("Wrote {} seen ids to {}", self.len(), self.path.display());
        Ok(())
    }
}
