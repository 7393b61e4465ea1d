//! SQLite record store
//!
//! This module provides a SQLite-based implementation of the RecordStore trait.
//! Each listing is one row keyed by id; the flattened record is kept as JSON
//! next to its fingerprint so content comparisons need no decoding.

use crate::listing::{Listing, ListingId, ListingStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordStore, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Loads the stored JSON record for an id
    pub fn record(&self, id: &ListingId) -> StorageResult<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT record FROM listings WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

impl RecordStore for SqliteStore {
    fn fingerprint(&self, id: &ListingId) -> StorageResult<Option<String>> {
        let fingerprint = self
            .conn
            .query_row(
                "SELECT fingerprint FROM listings WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(fingerprint)
    }

    fn status(&self, id: &ListingId) -> StorageResult<Option<ListingStatus>> {
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM listings WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status.as_deref().and_then(ListingStatus::from_db_string))
    }

    fn insert(&mut self, listing: &Listing) -> StorageResult<()> {
        let record = serde_json::to_string(&listing.to_record())?;
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO listings (id, url, seed, status, fingerprint, record, first_seen_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                listing.id.as_str(),
                listing.url,
                listing.seed,
                listing.status().to_db_string(),
                listing.fingerprint(),
                record,
                now,
            ],
        )?;
        Ok(())
    }

    fn replace(&mut self, listing: &Listing) -> StorageResult<()> {
        let record = serde_json::to_string(&listing.to_record())?;
        let changed = self.conn.execute(
            "UPDATE listings
             SET url = ?2, seed = ?3, status = ?4, fingerprint = ?5, record = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                listing.id.as_str(),
                listing.url,
                listing.seed,
                listing.status().to_db_string(),
                listing.fingerprint(),
                record,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if changed == 0 {
            return Err(crate::storage::StorageError::NotFound(listing.id.to_string()));
        }
        Ok(())
    }

    fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_status(&self) -> StorageResult<BTreeMap<String, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM listings GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let (status, count) = row?;
            counts.insert(status, count as u64);
        }
        Ok(counts)
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("SQLite database {}", path.display()),
            None => "in-memory SQLite database".to_string(),
        }
    }
}
