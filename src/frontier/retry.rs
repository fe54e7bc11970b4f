//! Retry policy: what happens to a task after a fetch attempt
//!
//! A failed fetch is penalized: `try_count` goes up and the task either waits
//! out a fixed backoff or, at `max_tries`, fails for good. An expired lease is
//! not a failure and never reaches this module; the claim protocol simply
//! hands the task to someone else with its `try_count` unchanged.

use crate::frontier::Frontier;
use crate::state::TaskStatus;
use crate::storage::{
    FrontierStore, LogEntry, LogEvent, StorageError, StorageResult, TaskRecord, TaskUpdate,
};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Result of one fetch attempt, as far as the retry policy cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTTP 200; the document was stored and its links discovered
    Success,

    /// Any other HTTP status
    HttpStatus(u16),

    /// The request never produced a response
    Transport(String),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// The status transition a resolved task ended up with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Done,
    RetryLater {
        retry_at: DateTime<Utc>,
        try_count: u32,
    },
    Failed {
        try_count: u32,
    },
}

impl Resolution {
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Done => TaskStatus::Done,
            Self::RetryLater { .. } => TaskStatus::RetryLater,
            Self::Failed { .. } => TaskStatus::Failed,
        }
    }

    /// Reads the resolution off a task's post-image
    fn from_task(task: &TaskRecord) -> Option<Self> {
        match task.status {
            TaskStatus::Done => Some(Self::Done),
            TaskStatus::RetryLater => task.retry_at.map(|retry_at| Self::RetryLater {
                retry_at,
                try_count: task.try_count,
            }),
            TaskStatus::Failed => Some(Self::Failed {
                try_count: task.try_count,
            }),
            _ => None,
        }
    }
}

/// Bounded, constant-backoff retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Failed attempts after which a task is failed permanently
    pub max_tries: u32,

    /// Delay between a failure and the next eligible claim
    pub retry_delay: chrono::Duration,
}

impl RetryPolicy {
    pub fn new(max_tries: u32, retry_delay: chrono::Duration) -> Self {
        Self {
            max_tries,
            retry_delay,
        }
    }

    /// The store update for `outcome`, observed at `now`
    ///
    /// Failures are counted by the store against its own `try_count`, never
    /// against the caller's copy of the task.
    pub fn update_for(&self, outcome: &FetchOutcome, now: DateTime<Utc>) -> TaskUpdate {
        if outcome.is_success() {
            TaskUpdate::Finish(TaskStatus::Done)
        } else {
            TaskUpdate::Failure {
                retry_at: now + self.retry_delay,
                max_tries: self.max_tries,
            }
        }
    }
}

impl<S: FrontierStore> Frontier<S> {
    /// Applies the retry policy to a task this worker holds the lease on
    ///
    /// Returns `None` when the lease was lost in the meantime: the task was
    /// reclaimed by another worker or already resolved. Nothing is written then.
    pub fn resolve(&mut self, task: &TaskRecord, outcome: &FetchOutcome) -> StorageResult<Option<Resolution>> {
        let Some(lease) = task.started_at else {
            tracing::warn!(task_id = task.id, "Task {} was never leased; not resolving", task.url);
            return Ok(None);
        };

        let now = self.clock.now();
        let update = self.policy.update_for(outcome, now);

        let Some(updated) = self.store.update_task(task.id, lease, &update)? else {
            tracing::warn!(
                task_id = task.id,
                "Lease on {} expired before it was resolved; dropping {:?}",
                task.url,
                outcome
            );
            return Ok(None);
        };

        let resolution = Resolution::from_task(&updated).ok_or_else(|| {
            StorageError::Database(format!(
                "task {} resolved to unexpected status {}",
                updated.id, updated.status
            ))
        })?;

        let entry = match &resolution {
            Resolution::Done => LogEntry::new(
                now,
                LogEvent::Done,
                &task.url,
                &task.scope,
                format!("Done processing {} with scope {}", task.url, task.scope),
            ),
            Resolution::RetryLater {
                retry_at,
                try_count,
            } => {
                tracing::info!(
                    task_id = task.id,
                    try_count,
                    "Fetch of {} failed ({:?}); retrying at {}",
                    task.url,
                    outcome,
                    retry_at
                );
                LogEntry::new(
                    now,
                    LogEvent::RetryScheduled,
                    &task.url,
                    &task.scope,
                    format!("Will retry {} after {}", task.url, retry_at),
                )
                .with_details(json!({
                    "try_count": try_count,
                    "retry_at": crate::storage::to_db_time(retry_at),
                    "outcome": describe(outcome),
                }))
            }
            Resolution::Failed { try_count } => {
                tracing::warn!(
                    task_id = task.id,
                    try_count,
                    "Giving up on {} after {} failed attempts",
                    task.url,
                    try_count
                );
                LogEntry::new(
                    now,
                    LogEvent::Failed,
                    &task.url,
                    &task.scope,
                    format!("Giving up on {} after {} attempts", task.url, try_count),
                )
                .with_details(json!({
                    "try_count": try_count,
                    "outcome": describe(outcome),
                }))
            }
        };
        self.log(entry)?;

        Ok(Some(resolution))
    }
}

fn describe(outcome: &FetchOutcome) -> serde_json::Value {
    match outcome {
        FetchOutcome::Success => json!("success"),
        FetchOutcome::HttpStatus(code) => json!({ "http_status": code }),
        FetchOutcome::Transport(message) => json!({ "transport_error": message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::test_support::*;
    use crate::frontier::Clock;
    use chrono::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(10, Duration::seconds(60))
    }

    #[test]
    fn test_success_finishes_without_penalty() {
        let update = policy().update_for(&FetchOutcome::Success, start_time());
        assert_eq!(update, TaskUpdate::Finish(TaskStatus::Done));
    }

    #[test]
    fn test_failure_schedules_constant_backoff() {
        let now = start_time();
        for outcome in [
            FetchOutcome::HttpStatus(500),
            FetchOutcome::Transport("connection reset".to_string()),
        ] {
            assert_eq!(
                policy().update_for(&outcome, now),
                TaskUpdate::Failure {
                    retry_at: now + Duration::seconds(60),
                    max_tries: 10,
                }
            );
        }
    }

    #[test]
    fn test_ten_consecutive_failures_end_in_failed() {
        let (mut frontier, clock) = memory_frontier(&test_config());
        seed(&mut frontier, "https://a.test/");

        for attempt in 1..=9u32 {
            let task = frontier.claim().unwrap().expect("task should be claimable");
            let resolution = frontier
                .resolve(&task, &FetchOutcome::HttpStatus(500))
                .unwrap()
                .unwrap();
            assert_eq!(
                resolution,
                Resolution::RetryLater {
                    retry_at: clock.now() + Duration::seconds(60),
                    try_count: attempt,
                }
            );
            clock.advance(Duration::seconds(60));
        }

        let task = frontier.claim().unwrap().unwrap();
        let resolution = frontier.resolve(&task, &FetchOutcome::HttpStatus(500)).unwrap();
        assert_eq!(resolution, Some(Resolution::Failed { try_count: 10 }));

        let stored = frontier.store().get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.retry_at, None);

        // Neither backoff nor lease expiry brings it back
        clock.advance(Duration::days(1));
        assert!(frontier.claim().unwrap().is_none());
    }

    #[test]
    fn test_resolve_does_not_override_terminal_status() {
        let (mut frontier, clock) = memory_frontier(&test_config());
        seed(&mut frontier, "https://a.test/");

        let slow = frontier.claim().unwrap().unwrap();
        clock.advance(Duration::seconds(301));
        let fast = frontier.claim().unwrap().unwrap();
        frontier.resolve(&fast, &FetchOutcome::Success).unwrap();

        assert_eq!(frontier.resolve(&slow, &FetchOutcome::HttpStatus(503)).unwrap(), None);

        let stored = frontier.store().get_task(slow.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Done);
        assert_eq!(stored.try_count, 0);
    }

    #[test]
    fn test_expired_holder_cannot_lower_try_count() {
        let (mut frontier, clock) = memory_frontier(&test_config());
        seed(&mut frontier, "https://a.test/");
        let stale = frontier.claim().unwrap().unwrap();

        // Three later holders each fail after the previous lease expired
        for _ in 0..3 {
            clock.advance(Duration::seconds(300));
            let task = frontier.claim().unwrap().unwrap();
            frontier.resolve(&task, &FetchOutcome::HttpStatus(500)).unwrap().unwrap();
        }
        assert_eq!(frontier.store().get_task(stale.id).unwrap().unwrap().try_count, 3);

        let logs_before = frontier.store().list_logs().unwrap().len();
        assert_eq!(frontier.resolve(&stale, &FetchOutcome::HttpStatus(500)).unwrap(), None);

        let stored = frontier.store().get_task(stale.id).unwrap().unwrap();
        assert_eq!(stored.try_count, 3);
        assert_eq!(frontier.store().list_logs().unwrap().len(), logs_before);
    }

    #[test]
    fn test_expired_holder_cannot_release_live_lease() {
        let (mut frontier, clock) = memory_frontier(&test_config());
        seed(&mut frontier, "https://a.test/");
        let stale = frontier.claim().unwrap().unwrap();

        clock.advance(Duration::seconds(300));
        let live = frontier.claim().unwrap().unwrap();
        assert_eq!(live.id, stale.id);

        assert_eq!(frontier.resolve(&stale, &FetchOutcome::HttpStatus(500)).unwrap(), None);

        // Past the stale holder's backoff, the task is still leased to the live worker
        clock.advance(Duration::seconds(60));
        assert!(frontier.claim().unwrap().is_none());

        let stored = frontier.store().get_task(live.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::InProgress);
        assert_eq!(stored.started_at, live.started_at);
        assert_eq!(
            frontier.resolve(&live, &FetchOutcome::Success).unwrap(),
            Some(Resolution::Done)
        );
    }

    #[test]
    fn test_resolution_logged() {
        let (mut frontier, _clock) = memory_frontier(&test_config());
        seed(&mut frontier, "https://a.test/");
        let task = frontier.claim().unwrap().unwrap();
        frontier.resolve(&task, &FetchOutcome::HttpStatus(404)).unwrap();

        let logs = frontier.store().list_logs().unwrap();
        let last = logs.last().unwrap();
        assert_eq!(last.event, LogEvent::RetryScheduled);
        assert_eq!(last.details["try_count"], 1);
        assert_eq!(last.details["outcome"]["http_status"], 404);
    }
}
