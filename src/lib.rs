//! Catalog Indexer: a pluggable fetch-retry-extract-batch engine
//!
//! This crate crawls remote catalogs (paginated listings plus per-item detail
//! pages) through site-specific indexers, and writes the extracted records to
//! disk as a single dataset per run.

pub mod config;
pub mod crawler;
pub mod indexers;
pub mod output;
pub mod url;

use std::time::Duration;
use thiserror::Error;

/// Run-level error type. Every variant aborts the run it occurs in.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Relay at {url} is unavailable: {reason}")]
    RelayUnavailable { url: String, reason: String },

    #[error("Failed to fetch the first listing page {url} after {attempts} attempts")]
    FirstPageUnavailable { url: String, attempts: u32 },

    #[error("Could not determine the page count from {url}: {reason}")]
    PaginationUndiscoverable { url: String, reason: String },

    #[error("No indexer registered under the name '{0}'")]
    UnknownIndexer(String),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a single fetch attempt
///
/// These never abort a run on their own: the retrying fetcher logs them,
/// backs off, and eventually reports the URL as absent.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout after {timeout:?} for {url}")]
    Timeout { url: String, timeout: Duration },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Relay reported '{status}' for {url}: {message}")]
    Relay {
        url: String,
        status: String,
        message: String,
    },

    #[error("Malformed relay response for {url}: {message}")]
    RelayDecode { url: String, message: String },
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

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error, PartialEq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("URL exceeds {max} characters")]
    TooLong { max: usize },

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Invalid host: {0}")]
    InvalidHost(String),
}

/// Result type alias for indexer runs
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, IndexerSettings};
pub use crawler::{run_indexer, Coordinator, RunSummary};
pub use indexers::{ExtractionError, Indexer, IndexerRegistry, ListingItem, Record};
pub use output::OutputFormat;
pub use url::{cache_key, validate_url};
