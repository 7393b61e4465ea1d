use crate::listing::{Listing, ListingStatus};
use crate::sink::{Decision, SinkError};
use crate::storage::{RecordStore, SeenIdSet};

/// Persists listings at most once per id across runs
///
/// The sink is the only writer of both the record store and the seen-id
/// set. Every accepted New listing is in the store before its id enters
/// the set, so a crash can only cause a re-emit, never a lost record.
pub struct DedupSink<S: RecordStore> {
    seen: SeenIdSet,
    store: S,
    replace_existing: bool,
    flushed: bool,
}

impl<S: RecordStore> DedupSink<S> {
    pub fn new(seen: SeenIdSet, store: S, replace_existing: bool) -> Self {
        Self {
            seen,
            store,
            replace_existing,
            flushed: false,
        }
    }

    /// Decides what to do with a finished listing and performs the write
    ///
    /// - Unknown id: the record is appended and the id remembered (`New`)
    /// - Known id, replacement off: nothing is written (`Skipped`)
    /// - Known id, replacement on: the stored record is replaced only when
    ///   its content fingerprint differs (`Updated`), otherwise `Skipped`
    ///
    /// A degraded listing never replaces a stored complete record.
    pub fn accept(&mut self, listing: &Listing) -> Result<Decision, SinkError> {
        if !self.seen.contains(&listing.id) {
            self.store.insert(listing)?;
            self.seen.insert(&listing.id);
            self.flushed = false;
            return Ok(Decision::New);
        }

        if !self.replace_existing {
            return Ok(Decision::Skipped);
        }

        if listing.status().is_degraded()
            && self.store.status(&listing.id)? == Some(ListingStatus::Complete)
        {
            tracing::debug!(
                "Keeping complete record of {} over a preview-only one",
                listing.id
            );
            return Ok(Decision::Skipped);
        }

        let fingerprint = listing.fingerprint();
        match self.store.fingerprint(&listing.id)? {
            Some(stored) if stored == fingerprint => Ok(Decision::Skipped),
            Some(_) => {
                self.store.replace(listing)?;
                Ok(Decision::Updated)
            }
            None => {
                // Seen in an earlier run but missing from this store
                self.store.insert(listing)?;
                Ok(Decision::Updated)
            }
        }
    }

    /// Persists the seen-id set; later calls are no-ops until new ids arrive
    pub fn flush(&mut self) -> Result<(), SinkError> {
        if self.flushed {
            return Ok(());
        }
        self.seen.flush().map_err(|source| SinkError::Flush {
            path: self.seen.path().to_path_buf(),
            source,
        })?;
        self.flushed = true;
        Ok(())
    }

    /// Flushes and hands back the parts
    pub fn finish(mut self) -> Result<(SeenIdSet, S), SinkError> {
        self.flush()?;
        Ok((self.seen, self.store))
    }

    pub fn seen(&self) -> &SeenIdSet {
        &self.seen
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DetailFields;
    use crate::listing::{FieldValue, ListingId};
    use crate::storage::JsonLinesStore;
    use std::path::Path;
    use tempfile::TempDir;

    fn listing(id: u32, price: i64) -> Listing {
        let mut listing = Listing::preview(
            &format!("https://www.immobiliare.it/annunci/{}/", id),
            "https://www.immobiliare.it/affitto-case/milano/",
        )
        .unwrap();
        let mut detail = DetailFields::default();
        detail
            .fields
            .insert("price".to_string(), FieldValue::Int(price));
        listing.merge_detail(detail);
        listing
    }

    fn sink(dir: &Path, replace_existing: bool) -> DedupSink<JsonLinesStore> {
        let seen = SeenIdSet::load(&dir.join("seen_ids.json")).unwrap();
        let store = JsonLinesStore::open(&dir.join("listings.jsonl")).unwrap();
        DedupSink::new(seen, store, replace_existing)
    }

    fn stored_lines(dir: &Path) -> usize {
        std::fs::read_to_string(dir.join("listings.jsonl"))
            .map(|c| c.lines().count())
            .unwrap_or(0)
    }

    #[test]
    fn test_new_then_skipped() {
        let dir = TempDir::new().unwrap();
        let mut sink = sink(dir.path(), false);

        assert_eq!(sink.accept(&listing(1, 950)).unwrap(), Decision::New);
        assert_eq!(sink.accept(&listing(1, 990)).unwrap(), Decision::Skipped);
        assert_eq!(stored_lines(dir.path()), 1);
        assert!(sink.seen().contains(&ListingId::new("1")));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = TempDir::new().unwrap();

        let mut first = sink(dir.path(), false);
        for id in 1..=3 {
            assert_eq!(first.accept(&listing(id, 900)).unwrap(), Decision::New);
        }
        first.finish().unwrap();

        let mut second = sink(dir.path(), false);
        for id in 1..=3 {
            assert_eq!(second.accept(&listing(id, 900)).unwrap(), Decision::Skipped);
        }
        let (seen, store) = second.finish().unwrap();

        assert_eq!(seen.len(), 3);
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(stored_lines(dir.path()), 3);
    }

    #[test]
    fn test_replace_only_when_content_changes() {
        let dir = TempDir::new().unwrap();
        let mut first = sink(dir.path(), false);
        first.accept(&listing(1, 950)).unwrap();
        first.finish().unwrap();

        let mut second = sink(dir.path(), true);
        assert_eq!(second.accept(&listing(1, 950)).unwrap(), Decision::Skipped);
        assert_eq!(second.accept(&listing(1, 990)).unwrap(), Decision::Updated);
        assert_eq!(second.accept(&listing(1, 990)).unwrap(), Decision::Skipped);
        assert_eq!(second.store().count().unwrap(), 1);

        let content = std::fs::read_to_string(dir.path().join("listings.jsonl")).unwrap();
        let prices: Vec<i64> = content
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
            .map(|record| record["price"].as_i64().unwrap())
            .collect();
        assert_eq!(prices, vec![990]);
    }

    #[test]
    fn test_preview_only_never_replaces_complete_record() {
        let dir = TempDir::new().unwrap();
        let mut first = sink(dir.path(), false);
        let mut complete = listing(7, 950);
        complete.fields.insert(
            "description".to_string(),
            FieldValue::Text("Bello".to_string()),
        );
        assert_eq!(first.accept(&complete).unwrap(), Decision::New);
        first.finish().unwrap();

        let mut degraded = Listing::preview(
            "https://www.immobiliare.it/annunci/7/",
            "https://www.immobiliare.it/affitto-case/milano/",
        )
        .unwrap();
        degraded.set_field("price", Some(FieldValue::Int(990)));
        degraded.mark_preview_only();

        let mut second = sink(dir.path(), true);
        assert_eq!(second.accept(&degraded).unwrap(), Decision::Skipped);
        second.finish().unwrap();

        let content = std::fs::read_to_string(dir.path().join("listings.jsonl")).unwrap();
        let record: serde_json::Value =
            serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(record["status"], "complete");
        assert_eq!(record["description"], "Bello");
        assert_eq!(record["price"], 950);
    }

    #[test]
    fn test_preview_only_replaces_preview_only_record() {
        let dir = TempDir::new().unwrap();
        let degraded = |price: i64| {
            let mut listing = Listing::preview(
                "https://www.immobiliare.it/annunci/8/",
                "https://www.immobiliare.it/affitto-case/milano/",
            )
            .unwrap();
            listing.set_field("price", Some(FieldValue::Int(price)));
            listing.mark_preview_only();
            listing
        };

        let mut sink = sink(dir.path(), true);
        assert_eq!(sink.accept(&degraded(950)).unwrap(), Decision::New);
        assert_eq!(sink.accept(&degraded(990)).unwrap(), Decision::Updated);
        assert_eq!(
            sink.store().status(&ListingId::new("8")).unwrap(),
            Some(ListingStatus::PreviewOnly)
        );
    }

    #[test]
    fn test_seen_id_missing_from_store_is_rewritten() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("seen_ids.json"), r#"["1"]"#).unwrap();

        let mut sink = sink(dir.path(), true);
        assert_eq!(sink.accept(&listing(1, 950)).unwrap(), Decision::Updated);
        assert_eq!(sink.store().count().unwrap(), 1);
    }

    #[test]
    fn test_flush_persists_ids() {
        let dir = TempDir::new().unwrap();
        let mut sink = sink(dir.path(), false);
        sink.accept(&listing(7, 1)).unwrap();
        sink.accept(&listing(8, 1)).unwrap();
        sink.flush().unwrap();
        sink.flush().unwrap();

        let reloaded = SeenIdSet::load(&dir.path().join("seen_ids.json")).unwrap();
        assert_eq!(reloaded.iter().collect::<Vec<_>>(), vec!["7", "8"]);
    }

    #[test]
    fn test_store_failure_leaves_id_unseen() {
        let dir = TempDir::new().unwrap();
        let records = dir.path().join("listings.jsonl");
        let mut sink = sink(dir.path(), false);

        // Appending to a directory fails
        std::fs::create_dir(&records).unwrap();
        assert!(sink.accept(&listing(2, 1)).is_err());
        assert!(!sink.seen().contains(&ListingId::new("2")));
    }
}
