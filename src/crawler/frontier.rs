//! Per-seed page navigation
//!
//! Each seed is walked by one task that owns its own queue:
//! - The seed URL is the first listing page
//! - Every result card on a listing page becomes a detail task
//! - Detail tasks run before the next listing page
//! - A missing, off-site or already visited next link ends the seed
//!
//! Detail failures never abort the seed; the preview is persisted instead.
//! The same holds for details still queued when shutdown is requested.

use crate::config::Config;
use crate::crawler::fetcher::{FetchError, FetchedPage, ResilientTransport};
use crate::crawler::pacing::Pacer;
use crate::crawler::shutdown::Shutdown;
use crate::crawler::task::{CrawlTask, TaskKind};
use crate::extract::{extract_detail, extract_listing_page, ListingPage, SiteProfile};
use crate::identity::IdentityRotator;
use crate::listing::{Listing, ListingId};
use crate::output::{save_debug_page, CrawlReport};
use crate::url::HostScope;
use crate::HarvestError;
use reqwest::header::HeaderMap;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Everything the seed tasks share
pub struct CrawlContext {
    pub transport: ResilientTransport,
    pub rotator: Arc<IdentityRotator>,
    pub profile: SiteProfile,
    pub pacer: Pacer,
    pub scope: HostScope,
    pub max_pages: Option<u32>,
    pub debug_dir: Option<PathBuf>,
}

impl CrawlContext {
    pub fn from_config(config: &Config) -> Result<Self, HarvestError> {
        Ok(Self {
            transport: ResilientTransport::from_config(config)?,
            rotator: Arc::new(IdentityRotator::from_config(&config.identity)),
            profile: SiteProfile::from_config(&config.site)?,
            pacer: Pacer::from_config(&config.politeness),
            scope: HostScope::new(&config.crawler.allowed_domains, &config.crawler.seeds),
            max_pages: config.crawler.max_pages,
            debug_dir: config.output.debug_dir.as_ref().map(PathBuf::from),
        })
    }

    fn capture_blocked(&self, kind: &str, error: &FetchError) {
        let (Some(dir), FetchError::Blocked { body, .. }) = (&self.debug_dir, error) else {
            return;
        };
        match save_debug_page(dir, &format!("blocked_{}", kind), body) {
            Ok(path) => tracing::info!("Saved blocked page to {}", path.display()),
            Err(e) => tracing::warn!("Failed to save blocked page in {}: {}", dir.display(), e),
        }
    }
}

/// Task queue and visited bookkeeping for one seed
#[derive(Debug)]
pub struct SeedFrontier {
    seed_url: Url,
    seed: String,
    queue: VecDeque<CrawlTask>,
    visited_pages: HashSet<String>,
    scheduled: HashSet<ListingId>,
    last_url: Option<Url>,
}

impl SeedFrontier {
    pub fn new(seed: Url) -> Self {
        let mut visited_pages = HashSet::new();
        visited_pages.insert(page_key(&seed));

        let mut queue = VecDeque::new();
        queue.push_back(CrawlTask::listing(seed.clone(), 1));

        Self {
            seed: seed.to_string(),
            seed_url: seed,
            queue,
            visited_pages,
            scheduled: HashSet::new(),
            last_url: None,
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn next_task(&mut self) -> Option<CrawlTask> {
        self.queue.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// URL of the previous fetch, sent as the Referer of the next one
    pub fn last_url(&self) -> Option<&Url> {
        self.last_url.as_ref()
    }

    pub fn record_fetch(&mut self, url: &Url) {
        self.last_url = Some(url.clone());
    }

    /// Puts a task back at the head of the queue
    pub fn requeue(&mut self, task: CrawlTask) {
        self.queue.push_front(task);
    }

    /// Empties the queue, degrading every pending detail task to its preview
    ///
    /// Queued listing pages are dropped.
    pub fn drain_previews(&mut self) -> Vec<Listing> {
        self.queue
            .drain(..)
            .filter_map(|task| match task.kind {
                TaskKind::DetailPage { mut listing } => {
                    listing.mark_preview_only();
                    Some(*listing)
                }
                _ => None,
            })
            .collect()
    }

    /// Ends the seed after whatever is already queued
    pub fn finish(&mut self) {
        let url = self.last_url.clone().unwrap_or_else(|| self.seed_url.clone());
        self.queue.push_back(CrawlTask::done(url));
    }

    /// Queues the details found on listing page `page_no`, then the next page or Done
    pub fn enqueue_listing_page(
        &mut self,
        page: ListingPage,
        page_no: u32,
        scope: &HostScope,
        max_pages: Option<u32>,
        report: &mut CrawlReport,
    ) {
        report.skipped_cards += page.skipped_cards as u64;

        for listing in page.listings {
            let Ok(url) = Url::parse(&listing.url) else {
                continue;
            };
            if !scope.allows(&url) {
                tracing::debug!("Ignoring off-site detail link {}", url);
                report.offsite_links += 1;
                continue;
            }
            if !self.scheduled.insert(listing.id.clone()) {
                tracing::debug!("Listing {} already scheduled for this seed", listing.id);
                report.duplicate_links += 1;
                continue;
            }
            self.queue.push_back(CrawlTask::detail(url, listing));
        }

        let Some(next) = page.next_page else {
            tracing::info!("Seed {} has no page after {}", self.seed, page_no);
            return self.finish();
        };

        if max_pages.is_some_and(|max| page_no >= max) {
            tracing::info!("Seed {} reached the page limit ({})", self.seed, page_no);
            self.finish();
        } else if !scope.allows(&next) {
            tracing::warn!("Next-page link {} leaves the allowed hosts, ending seed", next);
            report.offsite_links += 1;
            self.finish();
        } else if !self.visited_pages.insert(page_key(&next)) {
            tracing::warn!("Next-page link {} was already visited, ending seed", next);
            self.finish();
        } else {
            self.queue.push_back(CrawlTask::listing(next, page_no + 1));
        }
    }
}

fn page_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.to_string()
}

/// Crawls one seed to completion, sending every finished listing to the sink
///
/// # Arguments
///
/// * `ctx` - Shared transport, identities, profile and pacing
/// * `seed` - First listing page
/// * `sink` - Channel to the single sink task
/// * `shutdown` - Stops the traversal between fetches
///
/// # Returns
///
/// Counters for this seed
pub async fn run_seed(
    ctx: Arc<CrawlContext>,
    seed: Url,
    sink: mpsc::Sender<Listing>,
    mut shutdown: Shutdown,
) -> CrawlReport {
    let mut report = CrawlReport {
        seeds: 1,
        ..Default::default()
    };
    let mut frontier = SeedFrontier::new(seed);
    let mut session = ctx.rotator.session();
    tracing::info!("Starting seed {}", frontier.seed());

    while let Some(task) = frontier.next_task() {
        if matches!(task.kind, TaskKind::Done) {
            break;
        }
        if shutdown.is_triggered() {
            report.shutdown_requested = true;
            frontier.requeue(task);
            emit_pending_previews(&mut frontier, &sink, &mut report).await;
            break;
        }

        if frontier.last_url().is_some() {
            let delay = ctx.pacer.delay_before(&task.kind);
            tracing::debug!("Waiting {}ms before {}", delay.as_millis(), task);
            if !shutdown.sleep(delay).await {
                report.shutdown_requested = true;
                report.interrupted += 1;
                frontier.requeue(task);
                emit_pending_previews(&mut frontier, &sink, &mut report).await;
                break;
            }
        }

        let mut identity = session.next();
        if let Some(previous) = frontier.last_url() {
            identity.referer = Some(previous.to_string());
        }

        let mut task = task;
        let result = ctx
            .transport
            .fetch(&task.url, &HeaderMap::new(), &identity, &mut shutdown)
            .await;
        frontier.record_fetch(&task.url);
        if let Ok(page) = &result {
            task.attempt = page.attempts;
        }

        let CrawlTask { url, kind, attempt } = task;
        match kind {
            TaskKind::ListingPage { page } => {
                handle_listing_page(&ctx, &mut frontier, &url, page, result, &mut report);
            }
            TaskKind::DetailPage { listing } => {
                let listing = complete_listing(&ctx, *listing, &url, attempt, result, &mut report);
                if sink.send(listing).await.is_err() {
                    tracing::error!("Sink closed, stopping seed {}", frontier.seed());
                    break;
                }
            }
            TaskKind::Done => break,
        }
    }

    tracing::info!(
        "Finished seed {}: {} listing pages, {} complete, {} preview-only",
        frontier.seed(),
        report.listing_pages,
        report.complete,
        report.preview_only
    );
    report
}

/// Sends every queued detail task to the sink as a preview-only listing
async fn emit_pending_previews(
    frontier: &mut SeedFrontier,
    sink: &mpsc::Sender<Listing>,
    report: &mut CrawlReport,
) {
    let dropped = frontier.pending();
    let previews = frontier.drain_previews();
    tracing::info!(
        "Shutdown requested for {}: keeping {} previews, dropping {} other tasks",
        frontier.seed(),
        previews.len(),
        dropped - previews.len()
    );

    for listing in previews {
        report.preview_only += 1;
        if sink.send(listing).await.is_err() {
            tracing::error!("Sink closed, losing previews of {}", frontier.seed());
            break;
        }
    }
}

fn handle_listing_page(
    ctx: &CrawlContext,
    frontier: &mut SeedFrontier,
    url: &Url,
    page_no: u32,
    result: Result<FetchedPage, FetchError>,
    report: &mut CrawlReport,
) {
    let fetched = match result {
        Ok(fetched) => fetched,
        Err(e) => {
            record_failure(ctx, "listing", &e, report);
            tracing::error!("Abandoning seed {} at page {}: {}", frontier.seed(), page_no, e);
            return frontier.finish();
        }
    };
    report.listing_pages += 1;

    match extract_listing_page(&ctx.profile, &fetched.body, url, frontier.seed()) {
        Ok(page) => {
            tracing::info!(
                "Page {} of {}: {} results",
                page_no,
                frontier.seed(),
                page.listings.len()
            );
            frontier.enqueue_listing_page(page, page_no, &ctx.scope, ctx.max_pages, report);
        }
        Err(e) => {
            report.parse_failures += 1;
            tracing::error!("Abandoning seed {} at page {}: {}", frontier.seed(), page_no, e);
            frontier.finish();
        }
    }
}

/// Completes a preview from its detail page, or degrades it to preview-only
fn complete_listing(
    ctx: &CrawlContext,
    mut listing: Listing,
    url: &Url,
    attempts: u32,
    result: Result<FetchedPage, FetchError>,
    report: &mut CrawlReport,
) -> Listing {
    let fetched = match result {
        Ok(fetched) => fetched,
        Err(e) => {
            record_failure(ctx, "detail", &e, report);
            if !e.is_blocked() {
                tracing::warn!("Keeping preview of listing {}: {}", listing.id, e);
            }
            listing.mark_preview_only();
            report.preview_only += 1;
            return listing;
        }
    };
    report.detail_pages += 1;

    match extract_detail(&ctx.profile, &fetched.body, url.as_str()) {
        Ok(detail) => {
            listing.merge_detail(detail);
            report.complete += 1;
            tracing::debug!("Completed listing {} after {} requests", listing.id, attempts);
        }
        Err(e) => {
            report.parse_failures += 1;
            tracing::warn!("Keeping preview of listing {}: {}", listing.id, e);
            listing.mark_preview_only();
            report.preview_only += 1;
        }
    }
    listing
}

fn record_failure(ctx: &CrawlContext, kind: &str, error: &FetchError, report: &mut CrawlReport) {
    match error {
        FetchError::Blocked {
            url,
            status,
            marker,
            ..
        } => {
            report.blocked += 1;
            tracing::warn!(url = %url, status = *status, marker = %marker, "Blocked {} page", kind);
            ctx.capture_blocked(kind, error);
        }
        FetchError::Exhausted { .. } => report.exhausted += 1,
        FetchError::Status { .. } | FetchError::Request { .. } => report.status_failures += 1,
        FetchError::Interrupted { .. } => {
            report.interrupted += 1;
            report.shutdown_requested = true;
        }
    }
}

/// Fetches and extracts a single detail page outside any seed traversal
///
/// Failures are returned rather than degraded to a preview, since there is
/// no listing card to fall back on.
pub async fn fetch_single_detail(
    ctx: &CrawlContext,
    url: &str,
    shutdown: &mut Shutdown,
) -> Result<Listing, HarvestError> {
    let mut listing = Listing::preview(url, url)?;
    let target = Url::parse(&listing.url).map_err(|e| crate::UrlError::Parse(e.to_string()))?;

    let mut session = ctx.rotator.session();
    let identity = session.next();
    let fetched = match ctx
        .transport
        .fetch(&target, &HeaderMap::new(), &identity, shutdown)
        .await
    {
        Ok(fetched) => fetched,
        Err(e) => {
            ctx.capture_blocked("detail", &e);
            return Err(e.into());
        }
    };

    let detail = extract_detail(&ctx.profile, &fetched.body, target.as_str())?;
    listing.merge_detail(detail);
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> HostScope {
        HostScope::new(&[], &["https://www.immobiliare.it/affitto-case/milano/".to_string()])
    }

    fn seed() -> Url {
        Url::parse("https://www.immobiliare.it/affitto-case/milano/").unwrap()
    }

    fn preview(id: u32) -> Listing {
        Listing::preview(
            &format!("https://www.immobiliare.it/annunci/{}/", id),
            "https://www.immobiliare.it/affitto-case/milano/",
        )
        .unwrap()
    }

    fn page(ids: &[u32], next: Option<&str>) -> ListingPage {
        ListingPage {
            listings: ids.iter().map(|id| preview(*id)).collect(),
            next_page: next.map(|n| Url::parse(n).unwrap()),
            skipped_cards: 0,
        }
    }

    fn drain(frontier: &mut SeedFrontier) -> Vec<String> {
        std::iter::from_fn(|| frontier.next_task())
            .map(|task| task.to_string())
            .collect()
    }

    #[test]
    fn test_seed_is_first_task() {
        let mut frontier = SeedFrontier::new(seed());
        let task = frontier.next_task().unwrap();
        assert!(matches!(task.kind, TaskKind::ListingPage { page: 1 }));
        assert_eq!(task.url, seed());
        assert!(frontier.next_task().is_none());
    }

    #[test]
    fn test_details_come_before_next_page() {
        let mut frontier = SeedFrontier::new(seed());
        frontier.next_task();
        let mut report = CrawlReport::default();

        frontier.enqueue_listing_page(
            page(&[1, 2], Some("https://www.immobiliare.it/affitto-case/milano/?pag=2")),
            1,
            &scope(),
            None,
            &mut report,
        );

        assert_eq!(
            drain(&mut frontier),
            vec![
                "detail https://www.immobiliare.it/annunci/1",
                "detail https://www.immobiliare.it/annunci/2",
                "listing https://www.immobiliare.it/affitto-case/milano/?pag=2",
            ]
        );
    }

    #[test]
    fn test_missing_next_page_ends_seed() {
        let mut frontier = SeedFrontier::new(seed());
        frontier.next_task();
        let mut report = CrawlReport::default();

        frontier.enqueue_listing_page(page(&[1], None), 1, &scope(), None, &mut report);

        let tasks = drain(&mut frontier);
        assert_eq!(tasks.len(), 2);
        assert!(tasks[1].starts_with("done"));
    }

    #[test]
    fn test_page_limit_ends_seed() {
        let mut frontier = SeedFrontier::new(seed());
        frontier.next_task();
        let mut report = CrawlReport::default();

        frontier.enqueue_listing_page(
            page(&[], Some("https://www.immobiliare.it/affitto-case/milano/?pag=3")),
            2,
            &scope(),
            Some(2),
            &mut report,
        );

        let task = frontier.next_task().unwrap();
        assert!(matches!(task.kind, TaskKind::Done));
    }

    #[test]
    fn test_visited_next_page_ends_seed() {
        let mut frontier = SeedFrontier::new(seed());
        frontier.next_task();
        let mut report = CrawlReport::default();

        frontier.enqueue_listing_page(
            page(&[], Some("https://www.immobiliare.it/affitto-case/milano/#top")),
            1,
            &scope(),
            None,
            &mut report,
        );

        let task = frontier.next_task().unwrap();
        assert!(matches!(task.kind, TaskKind::Done));
    }

    #[test]
    fn test_offsite_and_duplicate_links_are_dropped() {
        let mut frontier = SeedFrontier::new(seed());
        frontier.next_task();
        let mut report = CrawlReport::default();

        let mut listing_page = page(&[1, 1], None);
        listing_page
            .listings
            .push(Listing::preview("https://ads.example.com/annunci/9/", "seed").unwrap());
        listing_page.skipped_cards = 2;

        frontier.enqueue_listing_page(listing_page, 1, &scope(), None, &mut report);

        assert_eq!(frontier.pending(), 2);
        assert_eq!(report.offsite_links, 1);
        assert_eq!(report.duplicate_links, 1);
        assert_eq!(report.skipped_cards, 2);
    }

    #[test]
    fn test_offsite_next_page_ends_seed() {
        let mut frontier = SeedFrontier::new(seed());
        frontier.next_task();
        let mut report = CrawlReport::default();

        frontier.enqueue_listing_page(
            page(&[], Some("https://elsewhere.example.com/page/2")),
            1,
            &scope(),
            None,
            &mut report,
        );

        assert!(matches!(frontier.next_task().unwrap().kind, TaskKind::Done));
        assert_eq!(report.offsite_links, 1);
    }

    #[test]
    fn test_drain_previews_degrades_pending_details() {
        let mut frontier = SeedFrontier::new(seed());
        frontier.next_task();
        let mut report = CrawlReport::default();

        frontier.enqueue_listing_page(
            page(&[1, 2], Some("https://www.immobiliare.it/affitto-case/milano/?pag=2")),
            1,
            &scope(),
            None,
            &mut report,
        );
        let first = frontier.next_task().unwrap();
        frontier.requeue(first);
        assert_eq!(frontier.pending(), 3);

        let previews = frontier.drain_previews();
        let ids: Vec<&str> = previews.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert!(previews
            .iter()
            .all(|l| l.status() == crate::listing::ListingStatus::PreviewOnly));
        assert_eq!(frontier.pending(), 0);
    }

    #[test]
    fn test_last_url_tracks_fetches() {
        let mut frontier = SeedFrontier::new(seed());
        assert!(frontier.last_url().is_none());
        frontier.record_fetch(&seed());
        assert_eq!(frontier.last_url(), Some(&seed()));
    }
}
