use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the frontier crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
}

/// Persistent store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file shared by all workers
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// How the completion detector treats tasks that are currently leased
///
/// The default is `Strict`. Under `Weak`, a run started from a single seed
/// stops every worker but the one holding the seed's lease, because at that
/// moment nothing is `pending`; only that worker goes on to crawl what the
/// seed discovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// Done when nothing is `pending` or `retry_later`; outstanding leases are ignored
    Weak,

    /// Done only when nothing is `pending`, `retry_later` or `inprogress`
    #[default]
    Strict,
}

/// Coordination protocol constants
#[derive(Debug, Clone, Deserialize)]
pub struct FrontierConfig {
    /// Maximum number of stored documents per scope
    #[serde(rename = "max-docs-per-scope", default = "default_max_docs_per_scope")]
    pub max_docs_per_scope: u64,

    /// Number of failed fetch attempts after which a task is failed for good
    #[serde(rename = "max-tries", default = "default_max_tries")]
    pub max_tries: u32,

    /// Fixed delay before a failed task becomes claimable again (seconds)
    #[serde(rename = "retry-delay-secs", default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Age after which an `inprogress` lease is considered abandoned (seconds)
    #[serde(rename = "lease-timeout-secs", default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,

    /// Sleep between polls when no task is claimable (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Completion predicate used by workers to decide when to stop
    #[serde(default)]
    pub completion: CompletionMode,
}

impl FrontierConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            max_docs_per_scope: default_max_docs_per_scope(),
            max_tries: default_max_tries(),
            retry_delay_secs: default_retry_delay_secs(),
            lease_timeout_secs: default_lease_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            completion: CompletionMode::default(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent workers started by a single process
    #[serde(default = "default_worker_count")]
    pub count: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_max_docs_per_scope() -> u64 {
    100
}

fn default_max_tries() -> u32 {
    10
}

fn default_retry_delay_secs() -> u64 {
    60
}

fn default_lease_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_worker_count() -> u32 {
    4
}

fn default_crawler_name() -> String {
    "FrontierCrawler".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}
