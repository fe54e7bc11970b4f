//! Frontier Crawler: lease-based crawl coordination over a shared store
//!
//! Many independent workers pull "fetch this URL within this scope" tasks from
//! a persistent frontier. The store is the only coordination medium: tasks are
//! claimed atomically, abandoned leases are reclaimed after a timeout, failed
//! fetches are retried with a fixed backoff, and discovered links are inserted
//! without duplicates.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::TaskStatus;
pub use storage::{FrontierStore, MemoryStore, SqliteStore, TaskRecord};
