//! Crawler module: the concrete pieces workers run with
//!
//! This module contains:
//! - HTTP fetching behind the `Fetcher` trait
//! - HTML extraction behind the `Extractor` trait
//! - The worker loop and a launcher for a pool of workers

mod fetcher;
mod parser;
mod worker;

pub use fetcher::{build_http_client, FetchError, FetchResponse, Fetcher, HttpFetcher};
pub use parser::{parse_html, ExtractedPage, Extractor, HtmlExtractor, EMPHASIS_TAGS};
pub use worker::{StepOutcome, Worker, WorkerSummary};

use crate::config::Config;
use crate::frontier::{Clock, Frontier, SystemClock};
use crate::storage::SqliteStore;
use crate::CrawlError;
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;

/// Runs `worker_count` workers against the configured database until each
/// observes completion
///
/// Every worker opens its own connection; nothing else is shared between
/// them apart from the HTTP client and extractor, which hold no frontier state.
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `worker_count` - Number of workers to spawn
///
/// # Returns
///
/// * `Ok(Vec<WorkerSummary>)` - One summary per worker, in spawn order
/// * `Err(CrawlError)` - A connection could not be opened or a worker panicked
pub async fn run_workers(config: &Config, worker_count: u32) -> Result<Vec<WorkerSummary>, CrawlError> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.user_agent)?);
    let extractor: Arc<dyn Extractor> = Arc::new(HtmlExtractor);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let database_path = Path::new(&config.store.database_path);

    tracing::info!(
        "Starting {} workers against {}",
        worker_count,
        config.store.database_path
    );

    let mut handles = Vec::with_capacity(worker_count as usize);
    for n in 1..=worker_count {
        let store = SqliteStore::open(database_path)?;
        let frontier = Frontier::new(store, &config.frontier, Arc::clone(&clock));
        let worker = Worker::new(
            format!("worker-{}", n),
            frontier,
            Arc::clone(&fetcher),
            Arc::clone(&extractor),
            config.frontier.poll_interval(),
        );

        let span = tracing::info_span!("worker", n);
        handles.push(tokio::spawn(worker.run().instrument(span)));
    }

    let mut summaries = Vec::with_capacity(handles.len());
    for handle in handles {
        let summary = handle
            .await
            .map_err(|e| CrawlError::Worker(e.to_string()))?;
        summaries.push(summary);
    }

    let processed: u64 = summaries.iter().map(|s| s.tasks_processed()).sum();
    tracing::info!("All workers finished after processing {} tasks", processed);

    Ok(summaries)
}
