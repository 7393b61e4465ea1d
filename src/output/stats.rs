//! Statistics over the persisted record store
//!
//! This module answers `--stats`: what previous runs have stored, without
//! crawling anything.

use crate::storage::{RecordStore, SeenIdSet, StorageResult};
use std::collections::BTreeMap;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Where the records live
    pub store: String,

    /// Total number of stored records
    pub total_records: u64,

    /// Count of records by listing status
    pub records_by_status: BTreeMap<String, u64>,

    /// Number of ids in the seen-id set
    pub seen_ids: u64,
}

impl StoreStatistics {
    /// Seen ids with no stored record, e.g. after the record file was removed
    pub fn missing_records(&self) -> u64 {
        self.seen_ids.saturating_sub(self.total_records)
    }
}

/// Loads statistics from a record store and seen-id set
///
/// # Arguments
///
/// * `store` - The record store to query
/// * `seen` - The persisted seen-id set
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query the store
pub fn load_statistics(store: &dyn RecordStore, seen: &SeenIdSet) -> StorageResult<StoreStatistics> {
    Ok(StoreStatistics {
        store: store.describe(),
        total_records: store.count()?,
        records_by_status: store.count_by_status()?,
        seen_ids: seen.len() as u64,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Store Statistics ===\n");

    println!("Overview:");
    println!("  Store: {}", stats.store);
    println!("  Stored listings: {}", stats.total_records);
    println!("  Seen ids: {}", stats.seen_ids);
    println!();

    println!("Listings by Status:");
    let mut status_counts: Vec<_> = stats.records_by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (status, count) in status_counts {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }

    if stats.missing_records() > 0 {
        println!();
        println!(
            "Warning: {} seen ids have no stored record",
            stats.missing_records()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::Listing;
    use crate::storage::JsonLinesStore;
    use tempfile::TempDir;

    #[test]
    fn test_load_statistics() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonLinesStore::open(&dir.path().join("listings.jsonl")).unwrap();
        let mut seen = SeenIdSet::load(&dir.path().join("seen_ids.json")).unwrap();

        for id in ["1", "2", "3"] {
            let mut listing = Listing::preview(
                &format!("https://www.immobiliare.it/annunci/{}/", id),
                "seed",
            )
            .unwrap();
            listing.mark_preview_only();
            store.insert(&listing).unwrap();
            seen.insert(&listing.id);
        }
        seen.insert(&crate::listing::ListingId::new("4"));

        let stats = load_statistics(&store, &seen).unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.seen_ids, 4);
        assert_eq!(stats.records_by_status.get("preview_only"), Some(&3));
        assert_eq!(stats.missing_records(), 1);
    }
}
