//! Frontier coordination protocol
//!
//! This module contains the protocol workers follow against the shared store:
//! - Atomic claiming with lease-timeout reclamation
//! - Fixed-backoff retries bounded by a maximum number of tries
//! - Scope-bounded, deduplicated discovery of new tasks
//! - An approximate per-scope document cap
//! - Completion detection
//!
//! `Frontier` wraps one store handle together with the protocol constants and
//! a clock. It holds no state of its own beyond that handle, so any number of
//! `Frontier`s over the same database coordinate purely through the store.

mod claim;
mod clock;
mod completion;
mod discovery;
mod limiter;
mod retry;
mod seed;

pub use clock::{Clock, ManualClock, SystemClock};
pub use discovery::DiscoveryReport;
pub use limiter::Admission;
pub use retry::{FetchOutcome, Resolution, RetryPolicy};

use crate::config::{CompletionMode, FrontierConfig};
use crate::storage::{FrontierStore, LogEntry, StorageResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Protocol view over one store handle
pub struct Frontier<S> {
    store: S,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    lease_timeout: chrono::Duration,
    max_docs_per_scope: u64,
    completion: CompletionMode,
}

impl<S: FrontierStore> Frontier<S> {
    /// Creates a frontier over `store` using the constants from `config`
    pub fn new(store: S, config: &FrontierConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            policy: RetryPolicy::new(config.max_tries, to_chrono(config.retry_delay())),
            lease_timeout: to_chrono(config.lease_timeout()),
            max_docs_per_scope: config.max_docs_per_scope,
            completion: config.completion,
        }
    }

    /// Current time according to this frontier's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Appends an entry to the audit trail
    pub fn log(&mut self, entry: LogEntry) -> StorageResult<()> {
        self.store.append_log(&entry)
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    // Validated configs stay far below chrono's range
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(3650))
}
