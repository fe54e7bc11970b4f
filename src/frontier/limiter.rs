//! Scope limiter: cap the number of documents stored per scope
//!
//! The check reads the current document count and acts on it without holding
//! anything between the read and the eventual insert. Workers that pass the
//! check at the same time can each store a document, so a scope may end up
//! above the cap by at most the number of concurrent workers.

use crate::frontier::Frontier;
use crate::state::TaskStatus;
use crate::storage::{FrontierStore, LogEntry, LogEvent, StorageResult, TaskRecord, TaskUpdate};
use serde_json::json;

/// Verdict of the scope limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Reject { documents: u64 },
}

impl<S: FrontierStore> Frontier<S> {
    /// Checks whether another document may be stored for `scope`
    pub fn admit_document(&self, scope: &str) -> StorageResult<Admission> {
        let documents = self.store.count_documents(scope)?;
        if documents >= self.max_docs_per_scope {
            Ok(Admission::Reject { documents })
        } else {
            Ok(Admission::Allow)
        }
    }

    /// Marks a leased task `ignored` because its scope is full
    ///
    /// Returns `false` if this worker no longer holds the lease.
    pub fn ignore(&mut self, task: &TaskRecord, documents: u64) -> StorageResult<bool> {
        let now = self.clock.now();
        let applied = match task.started_at {
            Some(lease) => self
                .store
                .update_task(task.id, lease, &TaskUpdate::Finish(TaskStatus::Ignored))?
                .is_some(),
            None => false,
        };

        tracing::info!(
            task_id = task.id,
            documents,
            "Not fetching {}: scope {} already has {} documents",
            task.url,
            task.scope,
            documents
        );

        if applied {
            self.log(
                LogEntry::new(
                    now,
                    LogEvent::Ignored,
                    &task.url,
                    &task.scope,
                    format!(
                        "Not fetching {} in scope {} because there are already {} in this scope",
                        task.url, task.scope, documents
                    ),
                )
                .with_details(json!({ "ndocs": documents })),
            )?;
        }

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::test_support::*;
    use crate::storage::DocumentRecord;
    use std::collections::BTreeMap;

    fn store_document(frontier: &mut crate::frontier::Frontier<crate::storage::MemoryStore>, task_id: i64) {
        let document = DocumentRecord {
            task_id,
            url: format!("https://a.test/{}", task_id),
            scope: SCOPE.to_string(),
            fetched_at: start_time(),
            status_code: 200,
            content_size: 0,
            html: String::new(),
            title: String::new(),
            emphasis: BTreeMap::new(),
        };
        frontier.store_mut().insert_document(&document).unwrap();
    }

    #[test]
    fn test_allows_below_cap() {
        let (mut frontier, _clock) = memory_frontier(&test_config());
        store_document(&mut frontier, 1);
        store_document(&mut frontier, 2);

        assert_eq!(frontier.admit_document(SCOPE).unwrap(), Admission::Allow);
    }

    #[test]
    fn test_rejects_at_cap() {
        let (mut frontier, _clock) = memory_frontier(&test_config());
        for id in 1..=3 {
            store_document(&mut frontier, id);
        }

        assert_eq!(
            frontier.admit_document(SCOPE).unwrap(),
            Admission::Reject { documents: 3 }
        );
        // Other scopes are counted separately
        assert_eq!(
            frontier.admit_document("https://b.test/").unwrap(),
            Admission::Allow
        );
    }

    #[test]
    fn test_parallel_admissions_overshoot_by_worker_count() {
        let (mut frontier, _clock) = memory_frontier(&test_config());
        store_document(&mut frontier, 1);
        store_document(&mut frontier, 2);

        // Three workers check before any of them stores its document
        let verdicts: Vec<_> = (0..3).map(|_| frontier.admit_document(SCOPE).unwrap()).collect();
        assert!(verdicts.iter().all(|v| *v == Admission::Allow));

        for id in 3..=5 {
            store_document(&mut frontier, id);
        }
        let stored = frontier.store().count_documents(SCOPE).unwrap();
        assert!(stored > 3, "race lets the scope exceed its cap");
        assert!(stored <= 3 + 3 - 1, "overshoot is bounded by the worker count");

        assert!(matches!(
            frontier.admit_document(SCOPE).unwrap(),
            Admission::Reject { .. }
        ));
    }

    #[test]
    fn test_ignore_is_terminal() {
        let (mut frontier, _clock) = memory_frontier(&test_config());
        seed(&mut frontier, "https://a.test/");
        let task = frontier.claim().unwrap().unwrap();

        assert!(frontier.ignore(&task, 3).unwrap());
        let stored = frontier.store().get_task(task.id).unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Ignored);

        assert!(!frontier.ignore(&task, 3).unwrap());
        let logs = frontier.store().list_logs().unwrap();
        assert_eq!(logs.last().unwrap().event, LogEvent::Ignored);
        assert_eq!(logs.last().unwrap().details["ndocs"], 3);
    }
}
