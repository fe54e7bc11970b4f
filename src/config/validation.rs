use crate::config::types::{Config, FrontierConfig, StoreConfig, UserAgentConfig, WorkerConfig};
use crate::ConfigError;

/// Upper bound for second-valued delays (ten years)
const MAX_DELAY_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_store_config(&config.store)?;
    validate_frontier_config(&config.frontier)?;
    validate_worker_config(&config.worker)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates the protocol constants
fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    if config.max_docs_per_scope < 1 {
        return Err(ConfigError::Validation(format!(
            "max_docs_per_scope must be >= 1, got {}",
            config.max_docs_per_scope
        )));
    }

    if config.max_tries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_tries must be >= 1, got {}",
            config.max_tries
        )));
    }

    // A zero lease would let every in-flight task be stolen immediately
    if config.lease_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "lease_timeout_secs must be >= 1, got {}",
            config.lease_timeout_secs
        )));
    }

    if config.retry_delay_secs > MAX_DELAY_SECS || config.lease_timeout_secs > MAX_DELAY_SECS {
        return Err(ConfigError::Validation(format!(
            "retry_delay_secs and lease_timeout_secs must be <= {}",
            MAX_DELAY_SECS
        )));
    }

    if config.poll_interval_ms < 1 {
        return Err(ConfigError::Validation(format!(
            "poll_interval_ms must be >= 1, got {}",
            config.poll_interval_ms
        )));
    }

    Ok(())
}

fn validate_worker_config(config: &WorkerConfig) -> Result<(), ConfigError> {
    if config.count < 1 || config.count > 256 {
        return Err(ConfigError::Validation(format!(
            "worker count must be between 1 and 256, got {}",
            config.count
        )));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    Ok(())
}
