//! Storage traits and error types
//!
//! This module defines the narrow set of operations the coordination protocol
//! requires from the persistent store.

use crate::state::TaskStatus;
use crate::storage::{DocumentRecord, LogEntry, NewTask, TaskRecord, TaskUpdate};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for frontier store implementations
///
/// Every worker holds its own handle. Handles never share in-process state
/// beyond what the backend itself shares, so the atomicity of `claim` and
/// `insert_task_if_absent` is what keeps concurrent workers apart.
pub trait FrontierStore: Send {
    // ===== Atomic Primitives =====

    /// Atomically selects one claimable task, leases it and returns the post-image
    ///
    /// A task is claimable when it is `pending`, `retry_later` with
    /// `retry_at <= now`, or `inprogress` with `started_at <= stale_before`.
    /// The selected task gets `status = inprogress`, `started_at = now` and a
    /// cleared `retry_at`. Selection and mutation happen as one indivisible step.
    ///
    /// Returns `None` when nothing is claimable.
    fn claim(
        &mut self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> StorageResult<Option<TaskRecord>>;

    /// Inserts a `pending` task unless one already exists for `(url, scope)`
    ///
    /// Returns `true` if a record was created. An existing record is never touched.
    fn insert_task_if_absent(&mut self, task: &NewTask) -> StorageResult<bool>;

    // ===== Task Management =====

    /// Applies a transition on behalf of the lease that started at `lease_started_at`
    ///
    /// The write happens only if the task is `inprogress` with exactly that
    /// `started_at`; check and write are one indivisible step. Returns the
    /// post-image, or `None` when the caller no longer holds the lease (it was
    /// reclaimed, or the task already left `inprogress`).
    fn update_task(
        &mut self,
        task_id: i64,
        lease_started_at: DateTime<Utc>,
        update: &TaskUpdate,
    ) -> StorageResult<Option<TaskRecord>>;

    /// Gets a task by ID
    fn get_task(&self, task_id: i64) -> StorageResult<Option<TaskRecord>>;

    /// Gets a task by its `(url, scope)` key
    fn find_task(&self, url: &str, scope: &str) -> StorageResult<Option<TaskRecord>>;

    /// Gets every task, ordered by ID
    fn list_tasks(&self) -> StorageResult<Vec<TaskRecord>>;

    /// Counts tasks whose status is one of `statuses`
    fn count_tasks(&self, statuses: &[TaskStatus]) -> StorageResult<u64>;

    /// Counts tasks grouped by status
    fn count_tasks_by_status(&self) -> StorageResult<BTreeMap<TaskStatus, u64>>;

    // ===== Documents =====

    /// Stores a document unless one already exists for the same task
    ///
    /// Returns `true` if the document was stored.
    fn insert_document(&mut self, document: &DocumentRecord) -> StorageResult<bool>;

    /// Counts stored documents for a scope
    fn count_documents(&self, scope: &str) -> StorageResult<u64>;

    /// Counts stored documents grouped by scope
    fn count_documents_by_scope(&self) -> StorageResult<BTreeMap<String, u64>>;

    // ===== Audit Trail =====

    /// Appends an audit trail entry
    fn append_log(&mut self, entry: &LogEntry) -> StorageResult<()>;

    /// Gets every audit trail entry in insertion order
    fn list_logs(&self) -> StorageResult<Vec<LogEntry>>;

    // ===== Maintenance =====

    /// Removes all tasks, documents and log entries
    fn reset(&mut self) -> StorageResult<()>;
}
