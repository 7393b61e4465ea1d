//! End-of-run crawl report

use crate::sink::Decision;
use chrono::{DateTime, Utc};

/// Counters gathered while crawling, one per seed and merged at the end
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    pub seeds: u64,
    pub listing_pages: u64,
    pub detail_pages: u64,

    /// Listings completed from their detail page
    pub complete: u64,
    /// Listings persisted with preview fields only
    pub preview_only: u64,

    pub blocked: u64,
    pub exhausted: u64,
    pub status_failures: u64,
    pub parse_failures: u64,
    pub interrupted: u64,

    pub skipped_cards: u64,
    pub offsite_links: u64,
    pub duplicate_links: u64,

    /// Sink decisions
    pub new: u64,
    pub updated: u64,
    pub skipped: u64,
    pub sink_errors: u64,

    pub identities_issued: u64,
    pub identity_fallbacks: u64,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// True when the run ended because shutdown was requested
    pub shutdown_requested: bool,
}

impl CrawlReport {
    /// Adds another report's counters into this one
    pub fn merge(&mut self, other: &CrawlReport) {
        self.seeds += other.seeds;
        self.listing_pages += other.listing_pages;
        self.detail_pages += other.detail_pages;
        self.complete += other.complete;
        self.preview_only += other.preview_only;
        self.blocked += other.blocked;
        self.exhausted += other.exhausted;
        self.status_failures += other.status_failures;
        self.parse_failures += other.parse_failures;
        self.interrupted += other.interrupted;
        self.skipped_cards += other.skipped_cards;
        self.offsite_links += other.offsite_links;
        self.duplicate_links += other.duplicate_links;
        self.new += other.new;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.sink_errors += other.sink_errors;
        self.shutdown_requested |= other.shutdown_requested;
    }

    pub fn record_decision(&mut self, decision: Decision) {
        match decision {
            Decision::New => self.new += 1,
            Decision::Updated => self.updated += 1,
            Decision::Skipped => self.skipped += 1,
        }
    }

    /// Listings handed to the sink
    pub fn listings_emitted(&self) -> u64 {
        self.complete + self.preview_only
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_seconds()),
            _ => None,
        }
    }
}

/// Prints the report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Traversal:");
    println!("  Seeds crawled: {}", report.seeds);
    println!("  Listing pages fetched: {}", report.listing_pages);
    println!("  Detail pages fetched: {}", report.detail_pages);
    if let Some(secs) = report.duration_seconds() {
        println!("  Duration: {}s", secs);
    }
    println!();

    println!("Listings:");
    println!("  Complete: {}", report.complete);
    println!("  Preview only: {}", report.preview_only);
    println!("  Cards without link: {}", report.skipped_cards);
    println!();

    println!("Sink:");
    println!("  New: {}", report.new);
    println!("  Updated: {}", report.updated);
    println!("  Skipped: {}", report.skipped);
    if report.sink_errors > 0 {
        println!("  Errors: {}", report.sink_errors);
    }
    println!();

    let failures = report.blocked
        + report.exhausted
        + report.status_failures
        + report.parse_failures
        + report.interrupted;
    if failures > 0 {
        println!("Failures:");
        println!("  Blocked: {}", report.blocked);
        println!("  Retries exhausted: {}", report.exhausted);
        println!("  Unexpected status: {}", report.status_failures);
        println!("  Unparseable pages: {}", report.parse_failures);
        println!("  Interrupted: {}", report.interrupted);
        println!();
    }

    println!(
        "Identities: {} issued, {} fallbacks to built-in presets",
        report.identities_issued, report.identity_fallbacks
    );
    if report.offsite_links > 0 || report.duplicate_links > 0 {
        println!(
            "Links ignored: {} off-site, {} duplicate",
            report.offsite_links, report.duplicate_links
        );
    }

    let emitted = report.listings_emitted();
    let completion_rate = if emitted > 0 {
        (report.complete as f64 / emitted as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Completion Rate: {:.1}% ({} / {} listings completed from detail pages)",
        completion_rate, report.complete, emitted
    );
    if report.shutdown_requested {
        println!("Run ended early: shutdown requested");
    }
}
