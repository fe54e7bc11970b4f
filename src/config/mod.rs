//! Configuration module for the frontier crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use frontier_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Lease timeout: {}s", config.frontier.lease_timeout_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CompletionMode, Config, FrontierConfig, StoreConfig, UserAgentConfig, WorkerConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
