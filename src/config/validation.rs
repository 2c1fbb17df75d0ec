use crate::config::types::{Config, FetchConfig, IndexerEntry, RelayConfig};
use crate::url::validate_url;
use crate::ConfigError;
use std::collections::HashSet;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_log_level(&config.logging.level)?;
    validate_output_dir(config)?;
    validate_fetch_config(&config.fetch)?;
    if let Some(relay) = &config.relay {
        validate_relay_config(relay)?;
    }
    validate_indexers(&config.indexers, config.relay.is_some())?;
    Ok(())
}

fn validate_log_level(level: &str) -> Result<(), ConfigError> {
    if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        return Err(ConfigError::Validation(format!(
            "logging level must be one of {}, got '{}'",
            LOG_LEVELS.join(", "),
            level
        )));
    }
    Ok(())
}

fn validate_output_dir(config: &Config) -> Result<(), ConfigError> {
    if config.output.dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output dir cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates global fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.concurrency_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "concurrency-limit must be >= 1, got {}",
            config.concurrency_limit
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates relay configuration
fn validate_relay_config(config: &RelayConfig) -> Result<(), ConfigError> {
    validate_url(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid relay url '{}': {}", config.url, e)))?;

    if config.concurrency_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "relay concurrency-limit must be >= 1, got {}",
            config.concurrency_limit
        )));
    }

    Ok(())
}

/// Validates indexer entries
fn validate_indexers(entries: &[IndexerEntry], relay_configured: bool) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in entries {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "indexer name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(entry.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "indexer '{}' is configured more than once",
                entry.name
            )));
        }

        validate_url(&entry.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid base-url '{}' for indexer '{}': {}",
                entry.base_url, entry.name, e
            ))
        })?;

        if entry.use_relay && !relay_configured {
            return Err(ConfigError::Validation(format!(
                "indexer '{}' uses the relay but no [relay] section is configured",
                entry.name
            )));
        }

        let overrides = &entry.settings;
        for (key, value) in [
            ("max-retries", overrides.max_retries.map(|v| v as usize)),
            ("concurrency-limit", overrides.concurrency_limit.map(|v| v as usize)),
            ("batch-size", overrides.batch_size),
            ("page-limit", overrides.page_limit.map(|v| v as usize)),
            ("chunk-size", overrides.chunk_size),
        ] {
            if value == Some(0) {
                return Err(ConfigError::Validation(format!(
                    "{} for indexer '{}' must be >= 1",
                    key, entry.name
                )));
            }
        }
    }

    Ok(())
}
