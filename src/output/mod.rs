//! Output module for crawl reports and diagnostics
//!
//! This module handles:
//! - The end-of-run crawl report
//! - Statistics over previously stored listings
//! - Captures of blocked pages for inspection

mod debug;
mod report;
pub mod stats;

pub use debug::save_debug_page;
pub use report::{print_report, CrawlReport};
pub use stats::{load_statistics, print_statistics, StoreStatistics};
