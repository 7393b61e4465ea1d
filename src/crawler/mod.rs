//! Crawler module for fetching and navigating listing pages
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with block detection and retry logic
//! - Politeness pacing between requests
//! - Per-seed page navigation
//! - Overall crawl coordination and shutdown

mod backoff;
mod blocking;
mod coordinator;
mod fetcher;
mod frontier;
mod pacing;
mod shutdown;
mod task;

pub use backoff::{FailureCause, RetryPolicy, RetryState};
pub use blocking::BlockDetector;
pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, FetchError, FetchedPage, ResilientTransport};
pub use frontier::{fetch_single_detail, run_seed, CrawlContext, SeedFrontier};
pub use pacing::Pacer;
pub use shutdown::{shutdown_channel, Shutdown, ShutdownHandle};
pub use task::{CrawlTask, TaskKind};

use crate::config::Config;
use crate::output::CrawlReport;
use crate::HarvestError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP client, identity rotator and site profile
/// 2. Open the record store and load the seen-id set
/// 3. Walk every seed's listing and detail pages
/// 4. Flush the seen-id set
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed
/// * `Err(HarvestError)` - Crawl could not start or the final flush failed
pub async fn crawl(config: Config) -> Result<CrawlReport, HarvestError> {
    Coordinator::new(config)?.run().await
}
