//! Crawler coordinator - main crawl orchestration logic
//!
//! This module ties the crawl together:
//! - Opening the record store and seen-id set
//! - Spawning one task per seed, bounded by the worker count
//! - Funnelling finished listings through a single sink task
//! - Flushing the seen-id set once every seed has stopped

use crate::config::Config;
use crate::crawler::frontier::{fetch_single_detail, run_seed, CrawlContext};
use crate::crawler::shutdown::{shutdown_channel, Shutdown, ShutdownHandle};
use crate::listing::Listing;
use crate::output::CrawlReport;
use crate::sink::{DedupSink, SinkError};
use crate::storage::{open_store, RecordStore, SeenIdSet};
use crate::HarvestError;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use url::Url;

/// Attempts made at the final seen-id flush
const FLUSH_ATTEMPTS: u32 = 3;
const FLUSH_RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Bound of the listing channel; seeds wait when the sink falls behind
const CHANNEL_CAPACITY: usize = 64;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    context: Arc<CrawlContext>,
    shutdown_handle: ShutdownHandle,
    shutdown: Shutdown,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Selectors or HTTP client could not be built
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let context = CrawlContext::from_config(&config)?;
        let (shutdown_handle, shutdown) = shutdown_channel();

        Ok(Self {
            config: Arc::new(config),
            context: Arc::new(context),
            shutdown_handle,
            shutdown,
        })
    }

    /// Handle that stops the crawl when triggered, e.g. from a Ctrl-C handler
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown_handle.clone()
    }

    /// Crawls every configured seed
    ///
    /// Seeds run concurrently up to `crawler.workers`; within a seed every
    /// request is sequential. Returns once all seeds have finished or
    /// stopped for shutdown and the seen-id set has been flushed.
    pub async fn run(self) -> Result<CrawlReport, HarvestError> {
        let started_at = Utc::now();
        let (tx, sink_task) = self.spawn_sink()?;

        let workers = self.config.crawler.workers.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(workers));
        tracing::info!(
            "Starting crawl of {} seeds with {} workers",
            self.config.crawler.seeds.len(),
            workers
        );

        let mut seeds = Vec::new();
        for seed in &self.config.crawler.seeds {
            let url = match Url::parse(seed) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!("Skipping invalid seed {}: {}", seed, e);
                    continue;
                }
            };

            let semaphore = Arc::clone(&semaphore);
            let context = Arc::clone(&self.context);
            let tx = tx.clone();
            let shutdown = self.shutdown.clone();
            seeds.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return CrawlReport::default();
                };
                run_seed(context, url, tx, shutdown).await
            }));
        }
        drop(tx);

        let mut report = CrawlReport::default();
        for handle in seeds {
            match handle.await {
                Ok(seed_report) => report.merge(&seed_report),
                Err(e) => tracing::error!("Seed task failed: {}", e),
            }
        }

        let sink_report = self.finish_sink(sink_task).await?;
        report.merge(&sink_report);
        report.identities_issued = self.context.rotator.issued();
        report.identity_fallbacks = self.context.rotator.fallbacks();
        report.started_at = Some(started_at);
        report.finished_at = Some(Utc::now());

        tracing::info!(
            "Crawl finished: {} new, {} updated, {} skipped",
            report.new,
            report.updated,
            report.skipped
        );
        Ok(report)
    }

    /// Fetches a single detail page and stores the completed listing
    pub async fn run_single_detail(self, url: &str) -> Result<CrawlReport, HarvestError> {
        let started_at = Utc::now();
        let mut shutdown = self.shutdown.clone();
        let listing = fetch_single_detail(&self.context, url, &mut shutdown).await?;

        let (tx, sink_task) = self.spawn_sink()?;
        tx.send(listing)
            .await
            .map_err(|_| HarvestError::Task("sink stopped before accepting the listing".into()))?;
        drop(tx);

        let mut report = self.finish_sink(sink_task).await?;
        report.detail_pages = 1;
        report.complete = 1;
        report.identities_issued = self.context.rotator.issued();
        report.identity_fallbacks = self.context.rotator.fallbacks();
        report.started_at = Some(started_at);
        report.finished_at = Some(Utc::now());
        Ok(report)
    }

    /// Opens the store and seen-id set and starts the single sink task
    fn spawn_sink(&self) -> Result<(mpsc::Sender<Listing>, SinkTask), HarvestError> {
        let output = &self.config.output;
        let seen = SeenIdSet::load(Path::new(&output.seen_ids_path))?;
        let store = open_store(output)?;
        let sink = DedupSink::new(seen, store, output.replace_existing);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        Ok((tx, tokio::spawn(drain_into_sink(sink, rx))))
    }

    async fn finish_sink(&self, sink_task: SinkTask) -> Result<CrawlReport, HarvestError> {
        let (mut sink, mut report) = sink_task
            .await
            .map_err(|e| HarvestError::Task(e.to_string()))?;
        flush_with_retry(&mut sink).await?;
        report.shutdown_requested = self.shutdown.is_triggered();
        Ok(report)
    }
}

type SinkTask = JoinHandle<(DedupSink<Box<dyn RecordStore>>, CrawlReport)>;

/// Accepts listings until every sender is gone
async fn drain_into_sink(
    mut sink: DedupSink<Box<dyn RecordStore>>,
    mut rx: mpsc::Receiver<Listing>,
) -> (DedupSink<Box<dyn RecordStore>>, CrawlReport) {
    let mut report = CrawlReport::default();

    while let Some(listing) = rx.recv().await {
        match sink.accept(&listing) {
            Ok(decision) => {
                tracing::debug!("Listing {} ({}): {}", listing.id, listing.status(), decision);
                report.record_decision(decision);
            }
            Err(e) => {
                tracing::error!("Failed to store listing {}: {}", listing.id, e);
                report.sink_errors += 1;
            }
        }
    }

    (sink, report)
}

async fn flush_with_retry<S: RecordStore>(sink: &mut DedupSink<S>) -> Result<(), SinkError> {
    let mut attempt = 1;
    loop {
        match sink.flush() {
            Ok(()) => {
                tracing::info!(
                    "Saved {} seen ids to {}",
                    sink.seen().len(),
                    sink.seen().path().display()
                );
                return Ok(());
            }
            Err(e) if attempt < FLUSH_ATTEMPTS => {
                tracing::warn!("Seen-id flush attempt {} failed: {}", attempt, e);
                attempt += 1;
                tokio::time::sleep(FLUSH_RETRY_PAUSE).await;
            }
            Err(e) => {
                tracing::error!(
                    "Could not save seen ids after {} attempts; the next run will re-emit this run's listings: {}",
                    FLUSH_ATTEMPTS,
                    e
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DetailFields;
    use crate::sink::Decision;
    use crate::storage::JsonLinesStore;
    use tempfile::TempDir;

    fn complete(id: u32) -> Listing {
        let mut listing = Listing::preview(
            &format!("https://www.immobiliare.it/annunci/{}/", id),
            "https://www.immobiliare.it/affitto-case/milano/",
        )
        .unwrap();
        listing.merge_detail(DetailFields::default());
        listing
    }

    #[tokio::test]
    async fn test_drain_counts_decisions() {
        let dir = TempDir::new().unwrap();
        let seen = SeenIdSet::load(&dir.path().join("seen_ids.json")).unwrap();
        let store: Box<dyn RecordStore> =
            Box::new(JsonLinesStore::open(&dir.path().join("listings.jsonl")).unwrap());
        let sink = DedupSink::new(seen, store, false);

        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(drain_into_sink(sink, rx));
        for id in [1, 2, 1] {
            tx.send(complete(id)).await.unwrap();
        }
        drop(tx);

        let (mut sink, report) = task.await.unwrap();
        assert_eq!((report.new, report.skipped), (2, 1));
        assert_eq!(sink.accept(&complete(3)).unwrap(), Decision::New);
    }

    #[tokio::test]
    async fn test_flush_retry_gives_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seen_ids.json");
        let seen = SeenIdSet::load(&path).unwrap();
        let store = JsonLinesStore::open(&dir.path().join("listings.jsonl")).unwrap();
        let mut sink = DedupSink::new(seen, store, false);
        sink.accept(&complete(1)).unwrap();

        // A non-empty directory in place of the file makes every rename fail
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let start = std::time::Instant::now();
        assert!(matches!(
            flush_with_retry(&mut sink).await,
            Err(SinkError::Flush { .. })
        ));
        assert!(start.elapsed() >= FLUSH_RETRY_PAUSE * (FLUSH_ATTEMPTS - 1));
    }

    #[test]
    fn test_new_rejects_invalid_selector() {
        let mut config = Config::with_seeds(vec!["https://www.immobiliare.it/".to_string()]);
        config.site.result_card = Some(vec!["li[".to_string()]);
        assert!(matches!(
            Coordinator::new(config),
            Err(HarvestError::Config(_))
        ));
    }
}
