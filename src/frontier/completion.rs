//! Completion detection

use crate::config::CompletionMode;
use crate::frontier::Frontier;
use crate::state::TaskStatus;
use crate::storage::{FrontierStore, StorageResult};

impl<S: FrontierStore> Frontier<S> {
    /// Returns true when no further work remains for this worker
    ///
    /// In `Weak` mode only `pending` and `retry_later` tasks count as work: a
    /// worker may stop while another still holds a lease, and a lease abandoned
    /// at that point is only recovered by a worker that is still running.
    /// `Strict` mode also waits for `inprogress` tasks, so a worker keeps
    /// polling until every lease is resolved or reclaimed.
    pub fn is_done(&self) -> StorageResult<bool> {
        let remaining = self.store.count_tasks(self.completion.outstanding_statuses())?;
        Ok(remaining == 0)
    }

    pub fn completion_mode(&self) -> CompletionMode {
        self.completion
    }
}

impl CompletionMode {
    /// Statuses that keep a worker running
    pub fn outstanding_statuses(&self) -> &'static [TaskStatus] {
        match self {
            Self::Weak => &[TaskStatus::Pending, TaskStatus::RetryLater],
            Self::Strict => &[
                TaskStatus::Pending,
                TaskStatus::RetryLater,
                TaskStatus::InProgress,
            ],
        }
    }
}
