//! Task status definitions for tracking frontier progress

use std::fmt;

/// Represents the current status of a task in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskStatus {
    // ===== Active States =====
    /// Discovered and waiting for a worker
    Pending,

    /// Leased by a worker; reclaimable once the lease times out
    InProgress,

    /// A fetch failed; claimable again once `retry_at` has passed
    RetryLater,

    // ===== Terminal States =====
    /// Fetched, stored and its links discovered
    Done,

    /// Skipped because its scope already holds enough documents
    Ignored,

    /// Gave up after the maximum number of failed fetches
    Failed,
}

impl TaskStatus {
    /// Returns true if no further transition out of this status is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Ignored | Self::Failed)
    }

    /// Returns true if the completion detector treats this status as outstanding work
    ///
    /// Leased tasks are deliberately excluded here; see `CompletionMode`.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, Self::Pending | Self::RetryLater)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "inprogress",
            Self::RetryLater => "retry_later",
            Self::Done => "done",
            Self::Ignored => "ignored",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "inprogress" => Some(Self::InProgress),
            "retry_later" => Some(Self::RetryLater),
            "done" => Some(Self::Done),
            "ignored" => Some(Self::Ignored),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::InProgress,
            Self::RetryLater,
            Self::Done,
            Self::Ignored,
            Self::Failed,
        ]
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
