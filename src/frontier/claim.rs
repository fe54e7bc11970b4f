//! Claim protocol: lease one eligible task to the calling worker

use crate::frontier::Frontier;
use crate::storage::{FrontierStore, LogEntry, LogEvent, StorageResult, TaskRecord};
use serde_json::json;

impl<S: FrontierStore> Frontier<S> {
    /// Atomically leases one claimable task
    ///
    /// Eligible tasks are `pending` ones, `retry_later` ones whose backoff has
    /// elapsed, and `inprogress` ones whose lease is at least `lease_timeout`
    /// old. Which eligible task is chosen is up to the store.
    ///
    /// `Ok(None)` means there is no work right now, not that an error occurred.
    pub fn claim(&mut self) -> StorageResult<Option<TaskRecord>> {
        let now = self.clock.now();
        let stale_before = now - self.lease_timeout;

        let Some(task) = self.store.claim(now, stale_before)? else {
            return Ok(None);
        };

        tracing::debug!(
            task_id = task.id,
            try_count = task.try_count,
            "Claimed {} in scope {}",
            task.url,
            task.scope
        );

        self.log(
            LogEntry::new(
                now,
                LogEvent::Claimed,
                &task.url,
                &task.scope,
                format!(
                    "Started processing url {} with scope {}",
                    task.url, task.scope
                ),
            )
            .with_details(json!({ "task_id": task.id, "try_count": task.try_count })),
        )?;

        Ok(Some(task))
    }
}
