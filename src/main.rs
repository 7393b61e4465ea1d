//! Immo-Harvest main entry point
//!
//! This is the command-line interface for the Immo-Harvest listing crawler.

use anyhow::Context;
use clap::Parser;
use immo_harvest::config::{load_config_with_hash, Config};
use immo_harvest::crawler::Coordinator;
use immo_harvest::output::{load_statistics, print_report, print_statistics};
use immo_harvest::storage::{open_store, SeenIdSet};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Immo-Harvest: a polite two-stage listing crawler
///
/// Immo-Harvest walks the search-result pages of a listing site, follows
/// each result to its detail page, and stores every listing once across
/// runs.
#[derive(Parser, Debug)]
#[command(name = "immo-harvest")]
#[command(version)]
#[command(about = "A polite two-stage listing crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "detail_url"])]
    dry_run: bool,

    /// Show statistics from the record store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "detail_url"])]
    stats: bool,

    /// Replace stored listings whose content changed
    #[arg(long)]
    replace_existing: bool,

    /// Stop each seed after this many listing pages
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Fetch and store a single detail page instead of crawling the seeds
    #[arg(long, value_name = "URL")]
    detail_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.replace_existing {
        config.output.replace_existing = true;
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = Some(max_pages);
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
        Ok(())
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(config, cli.detail_url.as_deref()).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("immo_harvest=info,warn"),
            1 => EnvFilter::new("immo_harvest=debug,info"),
            2 => EnvFilter::new("immo_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Immo-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    match config.crawler.max_pages {
        Some(max) => println!("  Max pages per seed: {}", max),
        None => println!("  Max pages per seed: unlimited"),
    }
    println!("  Concurrent seeds: {}", config.crawler.workers);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    if !config.crawler.allowed_domains.is_empty() {
        println!(
            "  Allowed domains: {}",
            config.crawler.allowed_domains.join(", ")
        );
    }

    println!("\nRetries:");
    println!("  Max retries: {}", config.retry.max_retries);
    println!(
        "  Backoff: {}s doubling, capped at {}s{}",
        config.retry.backoff_factor,
        config.retry.max_backoff,
        if config.retry.jitter { ", jittered" } else { "" }
    );
    println!("  Retried statuses: {:?}", config.retry.statuses);

    println!("\nPoliteness:");
    println!(
        "  Between listing pages: {}-{}ms",
        config.politeness.listing_delay_ms[0], config.politeness.listing_delay_ms[1]
    );
    println!(
        "  Before detail pages: {}-{}ms",
        config.politeness.detail_delay_ms[0], config.politeness.detail_delay_ms[1]
    );

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  Records: {}", config.output.records_path);
    println!("  Seen ids: {}", config.output.seen_ids_path);
    println!("  Replace existing: {}", config.output.replace_existing);
    if let Some(dir) = &config.output.debug_dir {
        println!("  Blocked page captures: {}", dir);
    }

    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        config.crawler.seeds.len()
    );
}

/// Handles the --stats mode: shows statistics from the record store
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let store = open_store(&config.output).context("Failed to open record store")?;
    let seen = SeenIdSet::load(Path::new(&config.output.seen_ids_path))
        .context("Failed to load seen ids")?;

    let stats = load_statistics(store.as_ref(), &seen)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, detail_url: Option<&str>) -> anyhow::Result<()> {
    tracing::info!(
        "Seeds: {}, workers: {}, replace existing: {}",
        config.crawler.seeds.len(),
        config.crawler.workers,
        config.output.replace_existing
    );

    let coordinator = Coordinator::new(config)?;

    let handle = coordinator.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            handle.trigger();
        }
    });

    let result = match detail_url {
        Some(url) => coordinator.run_single_detail(url).await,
        None => coordinator.run().await,
    };

    match result {
        Ok(report) => {
            print_report(&report);
            tracing::info!("Crawl completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
