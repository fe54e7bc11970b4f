//! Storage module for the shared frontier
//!
//! This module holds everything the coordination protocol needs from the
//! persistent store:
//! - Task, document and log record types
//! - The `FrontierStore` trait with its atomic claim and insert-if-absent primitives
//! - A SQLite backend shared between processes through one database file
//! - An in-process backend shared between tasks through a mutex

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{FrontierStore, StorageError, StorageResult};

use crate::state::TaskStatus;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Opens (or creates) the SQLite frontier at `path`
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::open(path)
}

/// One unit of work: fetch `url` and follow links that stay under `scope`
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: i64,
    pub url: String,
    pub scope: String,
    pub status: TaskStatus,
    pub added_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub retry_at: Option<DateTime<Utc>>,
    pub try_count: u32,
}

impl TaskRecord {
    /// Claim eligibility as evaluated at `now`
    ///
    /// A task is claimable when it is pending, when its backoff has elapsed, or
    /// when it has been leased since at or before `stale_before`.
    pub fn is_claimable(&self, now: DateTime<Utc>, stale_before: DateTime<Utc>) -> bool {
        match self.status {
            TaskStatus::Pending => true,
            TaskStatus::RetryLater => self.retry_at.map(|at| at <= now).unwrap_or(false),
            TaskStatus::InProgress => self.started_at.map(|at| at <= stale_before).unwrap_or(false),
            TaskStatus::Done | TaskStatus::Ignored | TaskStatus::Failed => false,
        }
    }
}

/// Fields for a task that is being discovered or seeded
#[derive(Debug, Clone)]
pub struct NewTask {
    pub url: String,
    pub scope: String,
    pub added_at: DateTime<Utc>,
}

/// A transition requested by the holder of a task's lease
///
/// Stores apply it only while the task is still `inprogress` under the same
/// `started_at`, so a holder whose lease was reclaimed cannot write.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    /// Move to `status` without counting a failed attempt; clears `retry_at`
    Finish(TaskStatus),

    /// Count one more failed attempt
    ///
    /// The store increments `try_count` itself. At `max_tries` the task becomes
    /// `failed`; below it, `retry_later` until `retry_at`.
    Failure {
        retry_at: DateTime<Utc>,
        max_tries: u32,
    },
}

/// A fetched page, stored once per task
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub task_id: i64,
    pub url: String,
    pub scope: String,
    pub fetched_at: DateTime<Utc>,
    pub status_code: u16,
    pub content_size: u64,
    pub html: String,
    pub title: String,
    pub emphasis: BTreeMap<String, Vec<String>>,
}

/// Kind of an audit trail entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogEvent {
    Added,
    Claimed,
    Fetched,
    FetchFailed,
    Ignored,
    Done,
    RetryScheduled,
    Failed,
    Discovered,
    DuplicateDocument,
}

impl LogEvent {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Claimed => "claimed",
            Self::Fetched => "fetched",
            Self::FetchFailed => "fetch_failed",
            Self::Ignored => "ignored",
            Self::Done => "done",
            Self::RetryScheduled => "retry_scheduled",
            Self::Failed => "failed",
            Self::Discovered => "discovered",
            Self::DuplicateDocument => "duplicate_document",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "added" => Some(Self::Added),
            "claimed" => Some(Self::Claimed),
            "fetched" => Some(Self::Fetched),
            "fetch_failed" => Some(Self::FetchFailed),
            "ignored" => Some(Self::Ignored),
            "done" => Some(Self::Done),
            "retry_scheduled" => Some(Self::RetryScheduled),
            "failed" => Some(Self::Failed),
            "discovered" => Some(Self::Discovered),
            "duplicate_document" => Some(Self::DuplicateDocument),
            _ => None,
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Append-only audit trail entry; never consulted for control decisions
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub logged_at: DateTime<Utc>,
    pub event: LogEvent,
    pub message: String,
    pub url: String,
    pub scope: String,
    pub details: serde_json::Value,
}

impl LogEntry {
    pub fn new(
        logged_at: DateTime<Utc>,
        event: LogEvent,
        task_url: &str,
        task_scope: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            logged_at,
            event,
            message: message.into(),
            url: task_url.to_string(),
            scope: task_scope.to_string(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Formats a timestamp for storage
///
/// Fixed width with a `Z` suffix, so string order is time order.
pub fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a timestamp written by `to_db_time`
pub fn parse_db_time(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}
