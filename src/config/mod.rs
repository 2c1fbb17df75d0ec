//! Configuration module for the indexer
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and resolving them into per-indexer settings records.
//!
//! # Example
//!
//! ```no_run
//! use catalog_indexer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! for settings in config.enabled_indexers() {
//!     println!("{} -> {}", settings.name, settings.base_url);
//! }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchConfig, IndexerEntry, IndexerOverrides, IndexerSettings, LoggingConfig,
    OutputConfig, RelayConfig, RelaySettings, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE,
    DEFAULT_PAGE_LIMIT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
