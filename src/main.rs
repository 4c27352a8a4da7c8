//! Catalog-Harvest main entry point
//!
//! This is the command-line interface for the catalog crawler.

use anyhow::Context;
use catalog_harvest::config::{load_config_with_hash, Config};
use catalog_harvest::crawler::crawl;
use catalog_harvest::output::{
    load_statistics, print_crawl_summary, print_statistics, store_outcome,
};
use catalog_harvest::storage::{open_storage, DocumentStore, SqliteStorage};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use tracing_subscriber::EnvFilter;

/// Catalog-Harvest: a university course catalog crawler
///
/// Crawls every qualification listed on a catalog index page, resolves the
/// modules each one is built from, and upserts the results into SQLite.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A university course catalog crawler", long_about = None)]
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

    /// Ignore and clear cached responses and modules from previous runs
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_harvest=info,warn"),
            1 => EnvFilter::new("catalog_harvest=debug,info"),
            2 => EnvFilter::new("catalog_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Host: {}", config.crawler.host);
    println!("  Catalog path: {}", config.crawler.catalog_path);
    println!(
        "  Qualification workers: {} (cap {})",
        config.crawler.qualification_pool_size(),
        config.crawler.max_qualification_workers
    );
    println!(
        "  Module workers per group: up to {}",
        config.crawler.max_module_workers
    );
    println!(
        "  Snapshot every {} cache insertions",
        config.crawler.cache_flush_interval
    );

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s", config.http.timeout_secs);
    println!("  Connect timeout: {}s", config.http.connect_timeout_secs);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling at {}{}",
        config.crawler.host.trim_end_matches('/'),
        config.crawler.catalog_path
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous snapshots)");
    } else {
        tracing::info!("Starting crawl (reusing snapshots from previous runs)");
    }

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let run_id = storage
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .create_run(config_hash)?;

    let outcome = match crawl(&config, Some(Arc::clone(&storage)), fresh).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            storage
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .fail_run(run_id)?;
            return Err(e.into());
        }
    };

    {
        let mut storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
        store_outcome(&mut *storage, &outcome)?;
        storage.complete_run(run_id, outcome.qualifications.len(), outcome.issues.len())?;
    }

    print_crawl_summary(&outcome);
    tracing::info!("Crawl run {} completed", run_id);

    Ok(())
}
