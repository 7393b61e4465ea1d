//! JSON lines record store
//!
//! One flattened record per line. New records are appended; replacing a
//! record rewrites the whole file atomically with the line swapped in place,
//! so record order is preserved across runs.

use crate::listing::{fingerprint_record, Listing, ListingId, ListingStatus};
use crate::storage::atomic::write_atomic;
use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
struct IndexEntry {
    line: usize,
    fingerprint: String,
    status: String,
}

/// Record store backed by a `.jsonl` file
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    lines: Vec<String>,
    index: HashMap<String, IndexEntry>,
}

impl JsonLinesStore {
    /// Opens the file at `path`, indexing any records already in it
    ///
    /// A missing file is an empty store. Lines that do not parse as a JSON
    /// object with a string `id` are kept verbatim but not indexed.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut store = Self {
            path: path.to_path_buf(),
            lines: Vec::new(),
            index: HashMap::new(),
        };

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(e.into()),
        };

        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let line_no = store.lines.len();
            store.lines.push(line.to_string());

            match parse_line(line) {
                Some((id, entry)) => {
                    store.index.insert(
                        id,
                        IndexEntry {
                            line: line_no,
                            ..entry
                        },
                    );
                }
                None => tracing::warn!(
                    "Ignoring unreadable record on line {} of {}",
                    n + 1,
                    path.display()
                ),
            }
        }

        tracing::debug!(
            "Loaded {} records from {}",
            store.index.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn render(listing: &Listing) -> StorageResult<(String, IndexEntry)> {
        let record = listing.to_record();
        let line = serde_json::to_string(&record)?;
        let entry = IndexEntry {
            line: 0,
            fingerprint: fingerprint_record(&record),
            status: listing.status().to_db_string().to_string(),
        };
        Ok((line, entry))
    }
}

fn parse_line(line: &str) -> Option<(String, IndexEntry)> {
    let record: Map<String, Value> = serde_json::from_str(line).ok()?;
    let id = record.get("id")?.as_str()?.to_string();
    let status = record
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    Some((
        id,
        IndexEntry {
            line: 0,
            fingerprint: fingerprint_record(&record),
            status,
        },
    ))
}

impl RecordStore for JsonLinesStore {
    fn fingerprint(&self, id: &ListingId) -> StorageResult<Option<String>> {
        Ok(self
            .index
            .get(id.as_str())
            .map(|entry| entry.fingerprint.clone()))
    }

    fn status(&self, id: &ListingId) -> StorageResult<Option<ListingStatus>> {
        Ok(self
            .index
            .get(id.as_str())
            .and_then(|entry| ListingStatus::from_db_string(&entry.status)))
    }

    fn insert(&mut self, listing: &Listing) -> StorageResult<()> {
        let (line, mut entry) = Self::render(listing)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;

        entry.line = self.lines.len();
        self.lines.push(line);
        self.index.insert(listing.id.to_string(), entry);
        Ok(())
    }

    fn replace(&mut self, listing: &Listing) -> StorageResult<()> {
        let line_no = self
            .index
            .get(listing.id.as_str())
            .map(|entry| entry.line)
            .ok_or_else(|| StorageError::NotFound(listing.id.to_string()))?;
        let (line, mut entry) = Self::render(listing)?;

        let mut lines = self.lines.clone();
        lines[line_no] = line;
        let mut content = lines.join("\n");
        content.push('\n');
        write_atomic(&self.path, content.as_bytes())?;

        entry.line = line_no;
        self.lines = lines;
        self.index.insert(listing.id.to_string(), entry);
        Ok(())
    }

    fn count(&self) -> StorageResult<u64> {
        Ok(self.index.len() as u64)
    }

    fn count_by_status(&self) -> StorageResult<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for entry in self.index.values() {
            *counts.entry(entry.status.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn describe(&self) -> String {
        format!("JSON lines file {}", self.path.display())
    }
}
