//! Manual seeding of the frontier

use crate::frontier::Frontier;
use crate::storage::{FrontierStore, LogEntry, LogEvent, NewTask, StorageResult};

impl<S: FrontierStore> Frontier<S> {
    /// Adds a task for `url` under `scope`
    ///
    /// Uses the same insert-if-absent as discovery, so seeding a pair that is
    /// already known changes nothing and returns `false`.
    pub fn add_task(&mut self, url: &str, scope: &str) -> StorageResult<bool> {
        let now = self.clock.now();
        let task = NewTask {
            url: url.to_string(),
            scope: scope.to_string(),
            added_at: now,
        };

        let inserted = self.store.insert_task_if_absent(&task)?;
        if inserted {
            tracing::info!("Added url {} with scope {}", url, scope);
            self.log(LogEntry::new(
                now,
                LogEvent::Added,
                url,
                scope,
                format!("Added url {} with scope {}", url, scope),
            ))?;
        } else {
            tracing::info!("Url {} with scope {} is already known", url, scope);
        }

        Ok(inserted)
    }
}
