//! In-process storage implementation
//!
//! `MemoryStore` handles are cheap clones over one mutex-guarded frontier, so
//! workers running as tasks in a single process can coordinate exactly as they
//! would through SQLite. Every trait method takes the lock once, which makes
//! `claim` and `insert_task_if_absent` atomic.

use crate::state::TaskStatus;
use crate::storage::traits::{FrontierStore, StorageError, StorageResult};
use crate::storage::{DocumentRecord, LogEntry, NewTask, TaskRecord, TaskUpdate};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    /// Tasks in insertion order; a task's ID is its index plus one
    tasks: Vec<TaskRecord>,

    /// `(url, scope)` -> task ID
    keys: HashMap<(String, String), i64>,

    documents: Vec<DocumentRecord>,

    logs: Vec<LogEntry>,
}

impl MemoryState {
    fn task_mut(&mut self, task_id: i64) -> Option<&mut TaskRecord> {
        let index = usize::try_from(task_id).ok()?.checked_sub(1)?;
        self.tasks.get_mut(index)
    }
}

/// Shared in-memory frontier
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Database("memory store lock poisoned".to_string()))
    }
}

impl FrontierStore for MemoryStore {
    fn claim(
        &mut self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StorageResult<Option<TaskRecord>> {
        let mut state = self.lock()?;

        let claimed = state
            .tasks
            .iter_mut()
            .find(|task| task.is_claimable(now, stale_before))
            .map(|task| {
                task.status = TaskStatus::InProgress;
                task.started_at = Some(now);
                task.retry_at = None;
                task.clone()
            });

        Ok(claimed)
    }

    fn insert_task_if_absent(&mut self, task: &NewTask) -> StorageResult<bool> {
        let mut state = self.lock()?;

        let key = (task.url.clone(), task.scope.clone());
        if state.keys.contains_key(&key) {
            return Ok(false);
        }

        let id = state.tasks.len() as i64 + 1;
        state.tasks.push(TaskRecord {
            id,
            url: task.url.clone(),
            scope: task.scope.clone(),
            status: TaskStatus::Pending,
            added_at: task.added_at,
            started_at: None,
            retry_at: None,
            try_count: 0,
        });
        state.keys.insert(key, id);

        Ok(true)
    }

    fn update_task(
        &mut self,
        task_id: i64,
        lease_started_at: DateTime<Utc>,
        update: &TaskUpdate,
    ) -> StorageResult<Option<TaskRecord>> {
        let mut state = self.lock()?;

        let Some(task) = state.task_mut(task_id) else {
            return Ok(None);
        };
        if task.status != TaskStatus::InProgress || task.started_at != Some(lease_started_at) {
            return Ok(None);
        }

        match update {
            TaskUpdate::Finish(status) => {
                task.status = *status;
                task.retry_at = None;
            }
            TaskUpdate::Failure {
                retry_at,
                max_tries,
            } => {
                task.try_count = task.try_count.saturating_add(1);
                if task.try_count >= *max_tries {
                    task.status = TaskStatus::Failed;
                    task.retry_at = None;
                } else {
                    task.status = TaskStatus::RetryLater;
                    task.retry_at = Some(*retry_at);
                }
            }
        }

        Ok(Some(task.clone()))
    }

    fn get_task(&self, task_id: i64) -> StorageResult<Option<TaskRecord>> {
        let state = self.lock()?;
        Ok(state.tasks.iter().find(|t| t.id == task_id).cloned())
    }

    fn find_task(&self, url: &str, scope: &str) -> StorageResult<Option<TaskRecord>> {
        let state = self.lock()?;
        Ok(state
            .tasks
            .iter()
            .find(|t| t.url == url && t.scope == scope)
            .cloned())
    }

    fn list_tasks(&self) -> StorageResult<Vec<TaskRecord>> {
        Ok(self.lock()?.tasks.clone())
    }

    fn count_tasks(&self, statuses: &[TaskStatus]) -> StorageResult<u64> {
        let state = self.lock()?;
        Ok(state
            .tasks
            .iter()
            .filter(|t| statuses.contains(&t.status))
            .count() as u64)
    }

    fn count_tasks_by_status(&self) -> StorageResult<BTreeMap<TaskStatus, u64>> {
        let state = self.lock()?;
        let mut counts = BTreeMap::new();
        for task in &state.tasks {
            *counts.entry(task.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn insert_document(&mut self, document: &DocumentRecord) -> StorageResult<bool> {
        let mut state = self.lock()?;

        if state.documents.iter().any(|d| d.task_id == document.task_id) {
            return Ok(false);
        }
        state.documents.push(document.clone());
        Ok(true)
    }

    fn count_documents(&self, scope: &str) -> StorageResult<u64> {
        let state = self.lock()?;
        Ok(state.documents.iter().filter(|d| d.scope == scope).count() as u64)
    }

    fn count_documents_by_scope(&self) -> StorageResult<BTreeMap<String, u64>> {
        let state = self.lock()?;
        let mut counts = BTreeMap::new();
        for document in &state.documents {
            *counts.entry(document.scope.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn append_log(&mut self, entry: &LogEntry) -> StorageResult<()> {
        self.lock()?.logs.push(entry.clone());
        Ok(())
    }

    fn list_logs(&self) -> StorageResult<Vec<LogEntry>> {
        Ok(self.lock()?.logs.clone())
    }

    fn reset(&mut self) -> StorageResult<()> {
        *self.lock()? = MemoryState::default();
        Ok(())
    }
}
