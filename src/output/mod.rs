//! Dataset output
//!
//! This module handles:
//! - Writing the final record set of a run as one dataset file
//! - Whole-array JSON and newline-delimited JSON persistence
//! - Recording run counters for the closing summary

pub mod stats;
mod writer;

pub use stats::{print_summary, RunSummary};
pub use writer::{write_dataset, WrittenDataset, JSONL_BUFFER_CAPACITY};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while persisting a dataset
///
/// All of them are fatal for the run: a partially written dataset is never
/// moved to its final name.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to persist dataset: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Serialization worker failed: {0}")]
    Worker(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// On-disk layout of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// One pretty-printed JSON array holding every record
    JsonArray,

    /// One compact JSON record per line
    JsonLines,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::JsonArray => write!(f, "json-array"),
            OutputFormat::JsonLines => write!(f, "json-lines"),
        }
    }
}
