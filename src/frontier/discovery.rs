//! Discovery: turn outbound links into new pending tasks

use crate::frontier::Frontier;
use crate::storage::{FrontierStore, LogEntry, LogEvent, NewTask, StorageResult, TaskRecord};
use serde_json::json;

/// What happened to the links of one page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// New tasks created
    pub inserted: usize,

    /// In-scope links that already had a task
    pub already_known: usize,

    /// Links outside the source task's scope
    pub out_of_scope: usize,
}

impl<S: FrontierStore> Frontier<S> {
    /// Inserts every in-scope link of `source` as a pending task
    ///
    /// A link is in scope when its string starts with `source.scope`, compared
    /// byte for byte with no normalization. Each insert is an atomic
    /// insert-if-absent on `(url, scope)`, so concurrent discoverers create at
    /// most one task and existing tasks keep their status.
    pub fn discover(&mut self, source: &TaskRecord, links: &[String]) -> StorageResult<DiscoveryReport> {
        let mut report = DiscoveryReport::default();

        for link in links {
            if !link.starts_with(&source.scope) {
                report.out_of_scope += 1;
                continue;
            }

            let now = self.clock.now();
            let task = NewTask {
                url: link.clone(),
                scope: source.scope.clone(),
                added_at: now,
            };

            if self.store.insert_task_if_absent(&task)? {
                report.inserted += 1;
                self.log(
                    LogEntry::new(
                        now,
                        LogEvent::Discovered,
                        link,
                        &source.scope,
                        format!("Discovered {} from {}", link, source.url),
                    )
                    .with_details(json!({ "source": source.url })),
                )?;
            } else {
                report.already_known += 1;
            }
        }

        tracing::debug!(
            task_id = source.id,
            inserted = report.inserted,
            already_known = report.already_known,
            out_of_scope = report.out_of_scope,
            "Discovered links from {}",
            source.url
        );

        Ok(report)
    }
}
