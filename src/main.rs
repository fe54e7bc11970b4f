//! Frontier Crawler main entry point
//!
//! This is the command-line interface for running workers against a shared
//! frontier database and for managing that database.

use clap::Parser;
use frontier_crawler::config::{load_config_with_hash, Config};
use frontier_crawler::crawler::run_workers;
use frontier_crawler::frontier::{Frontier, SystemClock};
use frontier_crawler::output::{load_statistics, print_statistics};
use frontier_crawler::storage::{open_store, FrontierStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Frontier Crawler: lease-based crawl workers over a shared store
///
/// Workers claim URLs from the frontier database, fetch them, store the
/// documents and add in-scope links back to the frontier. Run as many
/// instances as you like against the same database.
#[derive(Parser, Debug)]
#[command(name = "frontier-crawler")]
#[command(version)]
#[command(about = "Lease-based crawl workers over a shared frontier", long_about = None)]
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

    /// Number of workers to run (overrides [worker] count)
    #[arg(short, long, value_name = "N", conflicts_with_all = ["add", "reset", "stats"])]
    workers: Option<u32>,

    /// Add a URL to the frontier and exit
    #[arg(long, value_name = "URL", conflicts_with_all = ["reset", "stats"])]
    add: Option<String>,

    /// Scope for --add (defaults to the URL itself)
    #[arg(long, value_name = "SCOPE", requires = "add")]
    scope: Option<String>,

    /// Delete all tasks, documents and log entries and exit
    #[arg(long, conflicts_with_all = ["add", "stats"])]
    reset: bool,

    /// Show frontier statistics and exit
    #[arg(long, conflicts_with_all = ["add", "reset"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if let Some(url) = cli.add.as_deref() {
        handle_add(&config, url, cli.scope.as_deref())?;
    } else if cli.reset {
        handle_reset(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        let worker_count = cli.workers.unwrap_or(config.worker.count);
        handle_run(&config, worker_count).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("frontier_crawler=info,warn"),
            1 => EnvFilter::new("frontier_crawler=debug,info"),
            2 => EnvFilter::new("frontier_crawler=trace,debug"),
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

/// Handles the --add mode: seeds one task
fn handle_add(config: &Config, url: &str, scope: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let scope = scope.unwrap_or(url);
    let store = open_store(Path::new(&config.store.database_path))?;
    let mut frontier = Frontier::new(store, &config.frontier, Arc::new(SystemClock));

    if frontier.add_task(url, scope)? {
        println!("✓ Added {} (scope {})", url, scope);
    } else {
        println!("{} is already in the frontier for scope {}", url, scope);
    }

    Ok(())
}

/// Handles the --reset mode: empties the frontier
fn handle_reset(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = open_store(Path::new(&config.store.database_path))?;
    store.reset()?;

    tracing::info!("Frontier reset");
    println!("✓ Cleared all tasks, documents and logs in {}", config.store.database_path);

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.store.database_path);

    // Open the database
    let store = open_store(Path::new(&config.store.database_path))?;

    // Load statistics
    let stats = load_statistics(&store)?;

    // Print statistics
    print_statistics(&stats);

    Ok(())
}

/// Handles the main run: workers until completion or Ctrl-C
async fn handle_run(config: &Config, worker_count: u32) -> Result<(), Box<dyn std::error::Error>> {
    if worker_count == 0 {
        return Err("worker count must be at least 1".into());
    }

    tracing::info!(
        "Frontier limits: {} docs per scope, {} tries, {}s retry delay, {}s lease timeout",
        config.frontier.max_docs_per_scope,
        config.frontier.max_tries,
        config.frontier.retry_delay_secs,
        config.frontier.lease_timeout_secs
    );

    tokio::select! {
        result = run_workers(config, worker_count) => match result {
            Ok(summaries) => {
                for summary in &summaries {
                    tracing::info!(
                        "{}: {} done, {} ignored, {} retries scheduled, {} failed",
                        summary.worker_id,
                        summary.done,
                        summary.ignored,
                        summary.retries_scheduled,
                        summary.failed
                    );
                }
                tracing::info!("Crawl completed successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Crawl failed: {}", e);
                Err(e.into())
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; leases held by running workers expire after {}s", config.frontier.lease_timeout_secs);
            Ok(())
        }
    }
}
