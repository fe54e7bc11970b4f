//! Worker loop
//!
//! One worker repeatedly claims a task, fetches it, stores the document,
//! discovers outbound links and resolves the task, until the frontier reports
//! that no work remains. Workers share nothing but the store behind their
//! `Frontier`; any number of them can run side by side.

use crate::crawler::fetcher::{FetchResponse, Fetcher};
use crate::crawler::parser::{ExtractedPage, Extractor};
use crate::frontier::{Admission, FetchOutcome, Frontier, Resolution};
use crate::storage::{DocumentRecord, FrontierStore, LogEntry, LogEvent, StorageResult, TaskRecord};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// What a single iteration of the worker loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No task was claimable
    Idle,
    Done,
    Ignored,
    RetryScheduled,
    Failed,

    /// The lease expired and another worker now owns the task; nothing was written
    LeaseLost,

    /// The store failed mid-iteration; a claimed task is left to lease expiry
    StoreError,
}

impl From<&Resolution> for StepOutcome {
    fn from(resolution: &Resolution) -> Self {
        match resolution {
            Resolution::Done => Self::Done,
            Resolution::RetryLater { .. } => Self::RetryScheduled,
            Resolution::Failed { .. } => Self::Failed,
        }
    }
}

/// Per-worker tally returned when a worker stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker_id: String,
    pub done: u64,
    pub ignored: u64,
    pub retries_scheduled: u64,
    pub failed: u64,
    pub leases_lost: u64,
    pub store_errors: u64,
    pub idle_polls: u64,
}

impl WorkerSummary {
    fn new(worker_id: &str) -> Self {
        Self {
            worker_id: worker_id.to_string(),
            ..Self::default()
        }
    }

    fn record(&mut self, outcome: StepOutcome) {
        let counter = match outcome {
            StepOutcome::Idle => &mut self.idle_polls,
            StepOutcome::Done => &mut self.done,
            StepOutcome::Ignored => &mut self.ignored,
            StepOutcome::RetryScheduled => &mut self.retries_scheduled,
            StepOutcome::Failed => &mut self.failed,
            StepOutcome::LeaseLost => &mut self.leases_lost,
            StepOutcome::StoreError => &mut self.store_errors,
        };
        *counter += 1;
    }

    /// Tasks this worker took to a final or retry status
    pub fn tasks_processed(&self) -> u64 {
        self.done + self.ignored + self.retries_scheduled + self.failed
    }
}

/// A single crawl worker
pub struct Worker<S> {
    id: String,
    frontier: Frontier<S>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    poll_interval: Duration,
}

impl<S: FrontierStore> Worker<S> {
    pub fn new(
        id: impl Into<String>,
        frontier: Frontier<S>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            frontier,
            fetcher,
            extractor,
            poll_interval,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn frontier(&self) -> &Frontier<S> {
        &self.frontier
    }

    pub fn frontier_mut(&mut self) -> &mut Frontier<S> {
        &mut self.frontier
    }

    /// Runs until the frontier reports completion
    ///
    /// Store failures never end the loop: the iteration is abandoned and the
    /// whole poll cycle is retried after the poll interval.
    pub async fn run(mut self) -> WorkerSummary {
        let mut summary = WorkerSummary::new(&self.id);
        tracing::info!(worker = %self.id, "Worker started");

        loop {
            match self.frontier.is_done() {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(worker = %self.id, "Completion check failed: {}", e);
                    summary.record(StepOutcome::StoreError);
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            }

            let outcome = self.step().await;
            summary.record(outcome);

            if matches!(outcome, StepOutcome::Idle | StepOutcome::StoreError) {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        tracing::info!(
            worker = %self.id,
            done = summary.done,
            ignored = summary.ignored,
            retries = summary.retries_scheduled,
            failed = summary.failed,
            leases_lost = summary.leases_lost,
            "Worker finished: no pending work left"
        );

        summary
    }

    /// Performs one claim-to-resolve iteration
    pub async fn step(&mut self) -> StepOutcome {
        match self.try_step().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(worker = %self.id, "Store error, retrying poll cycle: {}", e);
                StepOutcome::StoreError
            }
        }
    }

    async fn try_step(&mut self) -> StorageResult<StepOutcome> {
        let Some(task) = self.frontier.claim()? else {
            return Ok(StepOutcome::Idle);
        };

        tracing::debug!(worker = %self.id, task_id = task.id, "Processing {}", task.url);

        if let Admission::Reject { documents } = self.frontier.admit_document(&task.scope)? {
            if !self.frontier.ignore(&task, documents)? {
                return Ok(StepOutcome::LeaseLost);
            }
            return Ok(StepOutcome::Ignored);
        }

        // No store handle is borrowed across the fetch
        let fetcher = Arc::clone(&self.fetcher);
        let outcome = match fetcher.fetch(&task.url).await {
            Ok(response) => self.handle_response(&task, response)?,
            Err(error) => {
                let message = error.to_string();
                let now = self.frontier.now();
                self.frontier.log(
                    LogEntry::new(
                        now,
                        LogEvent::FetchFailed,
                        &task.url,
                        &task.scope,
                        format!("Could not fetch {}", task.url),
                    )
                    .with_details(json!({ "error": message })),
                )?;
                FetchOutcome::Transport(message)
            }
        };

        match self.frontier.resolve(&task, &outcome)? {
            Some(resolution) => Ok(StepOutcome::from(&resolution)),
            None => Ok(StepOutcome::LeaseLost),
        }
    }

    /// Records a response; on 200 stores the document and discovers its links
    fn handle_response(&mut self, task: &TaskRecord, response: FetchResponse) -> StorageResult<FetchOutcome> {
        let now = self.frontier.now();
        self.frontier.log(
            LogEntry::new(
                now,
                LogEvent::Fetched,
                &task.url,
                &task.scope,
                format!("Fetched {} with status {}", task.url, response.status_code),
            )
            .with_details(json!({
                "status_code": response.status_code,
                "content_size": response.content_size,
            })),
        )?;

        if response.status_code != 200 {
            return Ok(FetchOutcome::HttpStatus(response.status_code));
        }

        let ExtractedPage {
            title,
            emphasis,
            links,
        } = self.extractor.extract(&task.url, &response.body);

        let document = DocumentRecord {
            task_id: task.id,
            url: task.url.clone(),
            scope: task.scope.clone(),
            fetched_at: now,
            status_code: response.status_code,
            content_size: response.content_size,
            html: response.body,
            title,
            emphasis,
        };

        if !self.frontier.store_mut().insert_document(&document)? {
            tracing::warn!(
                worker = %self.id,
                task_id = task.id,
                "Document for {} was already stored by an earlier lease holder",
                task.url
            );
            self.frontier.log(LogEntry::new(
                now,
                LogEvent::DuplicateDocument,
                &task.url,
                &task.scope,
                format!("Dropped duplicate document for {}", task.url),
            ))?;
        }

        self.frontier.discover(task, &links)?;

        Ok(FetchOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::fetcher::FetchError;
    use crate::crawler::parser::HtmlExtractor;
    use crate::frontier::test_support::*;
    use crate::frontier::{Clock, ManualClock};
    use crate::state::TaskStatus;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned pages and counts requests per URL
    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, (u16, String)>,
        requests: Mutex<HashMap<String, u32>>,
    }

    impl FakeFetcher {
        fn page(mut self, url: &str, status: u16, body: &str) -> Self {
            self.pages.insert(url.to_string(), (status, body.to_string()));
            self
        }

        fn requests_for(&self, url: &str) -> u32 {
            self.requests.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
            *self.requests.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
            match self.pages.get(url) {
                Some((status_code, body)) => Ok(FetchResponse {
                    status_code: *status_code,
                    content_size: body.len() as u64,
                    body: body.clone(),
                }),
                None => Err(FetchError::Connect {
                    url: url.to_string(),
                    message: "connection refused".to_string(),
                }),
            }
        }
    }

    /// Outlives its lease: while the request is in flight another worker reclaims the task
    struct StallingFetcher {
        clock: ManualClock,
        rival: Mutex<MemoryStore>,
    }

    #[async_trait]
    impl Fetcher for StallingFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchResponse, FetchError> {
            self.clock.advance(chrono::Duration::seconds(300));
            let now = self.clock.now();
            self.rival
                .lock()
                .unwrap()
                .claim(now, now - chrono::Duration::seconds(300))
                .unwrap()
                .unwrap();
            Ok(FetchResponse {
                status_code: 503,
                content_size: 0,
                body: String::new(),
            })
        }
    }

    fn worker(fetcher: Arc<FakeFetcher>) -> (Worker<MemoryStore>, ManualClock) {
        let (frontier, clock) = memory_frontier(&test_config());
        let worker = Worker::new(
            "worker-1",
            frontier,
            fetcher,
            Arc::new(HtmlExtractor),
            Duration::from_millis(1),
        );
        (worker, clock)
    }

    fn status_of(worker: &Worker<MemoryStore>, url: &str) -> Option<TaskStatus> {
        worker
            .frontier()
            .store()
            .find_task(url, SCOPE)
            .unwrap()
            .map(|t| t.status)
    }

    #[tokio::test]
    async fn test_idle_when_nothing_claimable() {
        let (mut worker, _clock) = worker(Arc::new(FakeFetcher::default()));
        assert_eq!(worker.step().await, StepOutcome::Idle);
    }

    #[tokio::test]
    async fn test_success_stores_document_and_discovers_in_scope_links() {
        let fetcher = Arc::new(FakeFetcher::default().page(
            "https://a.test/",
            200,
            r#"<title>Home</title><h1>Welcome</h1>
               <a href="/x">in scope</a><a href="https://b.test/">elsewhere</a>"#,
        ));
        let (mut worker, _clock) = worker(fetcher);
        seed(worker.frontier_mut(), "https://a.test/");

        assert_eq!(worker.step().await, StepOutcome::Done);

        assert_eq!(status_of(&worker, "https://a.test/"), Some(TaskStatus::Done));
        assert_eq!(status_of(&worker, "https://a.test/x"), Some(TaskStatus::Pending));
        assert!(worker
            .frontier()
            .store()
            .find_task("https://b.test/", SCOPE)
            .unwrap()
            .is_none());
        assert_eq!(worker.frontier().store().count_documents(SCOPE).unwrap(), 1);

        let events: Vec<_> = worker
            .frontier()
            .store()
            .list_logs()
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(
            events,
            vec![
                LogEvent::Claimed,
                LogEvent::Fetched,
                LogEvent::Discovered,
                LogEvent::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_http_error_schedules_retry_without_document() {
        let fetcher = Arc::new(FakeFetcher::default().page("https://a.test/", 503, "busy"));
        let (mut worker, _clock) = worker(fetcher);
        seed(worker.frontier_mut(), "https://a.test/");

        assert_eq!(worker.step().await, StepOutcome::RetryScheduled);
        assert_eq!(status_of(&worker, "https://a.test/"), Some(TaskStatus::RetryLater));
        assert_eq!(worker.frontier().store().count_documents(SCOPE).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transport_errors_exhaust_retries() {
        let fetcher = Arc::new(FakeFetcher::default());
        let (mut worker, clock) = worker(Arc::clone(&fetcher));
        seed(worker.frontier_mut(), "https://a.test/");

        let mut outcomes = Vec::new();
        for _ in 0..10 {
            outcomes.push(worker.step().await);
            clock.advance(chrono::Duration::seconds(60));
        }

        assert!(outcomes[..9].iter().all(|o| *o == StepOutcome::RetryScheduled));
        assert_eq!(outcomes[9], StepOutcome::Failed);
        assert_eq!(fetcher.requests_for("https://a.test/"), 10);
        assert_eq!(worker.step().await, StepOutcome::Idle);
    }

    #[tokio::test]
    async fn test_full_scope_is_ignored_without_fetching() {
        let fetcher = Arc::new(
            FakeFetcher::default()
                .page("https://a.test/1", 200, "one")
                .page("https://a.test/2", 200, "two")
                .page("https://a.test/3", 200, "three")
                .page("https://a.test/4", 200, "four"),
        );
        let (mut worker, _clock) = worker(Arc::clone(&fetcher));
        for n in 1..=4 {
            seed(worker.frontier_mut(), &format!("https://a.test/{}", n));
        }

        let mut outcomes = Vec::new();
        for _ in 0..4 {
            outcomes.push(worker.step().await);
        }

        assert_eq!(outcomes.iter().filter(|o| **o == StepOutcome::Done).count(), 3);
        assert_eq!(outcomes.iter().filter(|o| **o == StepOutcome::Ignored).count(), 1);
        let total_requests: u32 = (1..=4)
            .map(|n| fetcher.requests_for(&format!("https://a.test/{}", n)))
            .sum();
        assert_eq!(total_requests, 3);
    }

    #[tokio::test]
    async fn test_run_stops_when_frontier_drained() {
        let fetcher = Arc::new(
            FakeFetcher::default()
                .page("https://a.test/", 200, r#"<a href="/x">x</a>"#)
                .page("https://a.test/x", 200, r#"<a href="/">home</a>"#),
        );
        let (mut worker, _clock) = worker(fetcher);
        seed(worker.frontier_mut(), "https://a.test/");
        let store = worker.frontier().store().clone();

        let summary = worker.run().await;

        assert_eq!(summary.worker_id, "worker-1");
        assert_eq!(summary.done, 2);
        assert_eq!(summary.tasks_processed(), 2);
        assert_eq!(store.count_tasks(&[TaskStatus::Done]).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_reclaimed_task_does_not_store_second_document() {
        let fetcher = Arc::new(FakeFetcher::default().page("https://a.test/", 200, "page"));
        let (mut first, clock) = worker(Arc::clone(&fetcher));
        seed(first.frontier_mut(), "https://a.test/");

        // A stalled lease holder: claimed but never finished
        let stalled = first.frontier_mut().claim().unwrap().unwrap();
        clock.advance(chrono::Duration::seconds(300));

        assert_eq!(first.step().await, StepOutcome::Done);

        // The stalled holder wakes up and stores its copy
        let mut late = Worker::new(
            "worker-2",
            Frontier::new(
                first.frontier().store().clone(),
                &test_config(),
                Arc::new(clock.clone()),
            ),
            fetcher,
            Arc::new(HtmlExtractor),
            Duration::from_millis(1),
        );
        let response = FetchResponse {
            status_code: 200,
            content_size: 4,
            body: "page".to_string(),
        };
        let outcome = late.handle_response(&stalled, response).unwrap();
        assert_eq!(outcome, FetchOutcome::Success);

        let store = late.frontier().store();
        assert_eq!(store.count_documents(SCOPE).unwrap(), 1);
        let logs = store.list_logs().unwrap();
        assert_eq!(logs.last().unwrap().event, LogEvent::DuplicateDocument);
    }

    #[tokio::test]
    async fn test_expired_lease_holder_writes_nothing() {
        let (frontier, clock) = memory_frontier(&test_config());
        let fetcher = Arc::new(StallingFetcher {
            clock: clock.clone(),
            rival: Mutex::new(frontier.store().clone()),
        });
        let mut worker = Worker::new(
            "worker-1",
            frontier,
            fetcher,
            Arc::new(HtmlExtractor),
            Duration::from_millis(1),
        );
        seed(worker.frontier_mut(), "https://a.test/");

        assert_eq!(worker.step().await, StepOutcome::LeaseLost);

        let task = worker.frontier().store().find_task("https://a.test/", SCOPE).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.started_at, Some(clock.now()));
        assert_eq!(task.try_count, 0);
    }
}
