//! Run counters and their display
//!
//! A [`RunSummary`] is produced by every completed indexer run and printed by
//! the CLI once all runs are done.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Counters for one completed indexer run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Indexer identifier
    pub indexer: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Listing pages reported by pagination discovery
    pub pages_discovered: u32,

    /// Listing pages fetched and extracted
    pub pages_processed: u32,

    /// Listing items extracted across all pages
    pub items_extracted: usize,

    /// Records in the dataset
    pub records_written: usize,

    /// Detail batches scheduled
    pub batches: usize,

    /// Network attempts issued, retries included
    pub fetch_attempts: u64,

    /// Logical fetches that exhausted their attempts
    pub fetch_failures: u64,

    pub elapsed: Duration,

    pub output_path: PathBuf,

    pub output_bytes: u64,
}

impl RunSummary {
    /// Output size in megabytes
    pub fn output_megabytes(&self) -> f64 {
        self.output_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Share of discovered pages that were processed, in percent
    pub fn page_success_rate(&self) -> f64 {
        if self.pages_discovered == 0 {
            0.0
        } else {
            f64::from(self.pages_processed) / f64::from(self.pages_discovered) * 100.0
        }
    }
}

/// Prints a run summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== {} ===", summary.indexer);
    println!("  Started: {}", summary.started_at.to_rfc3339());
    println!(
        "  Pages: {} / {} processed ({:.1}%)",
        summary.pages_processed,
        summary.pages_discovered,
        summary.page_success_rate()
    );
    println!("  Items extracted: {}", summary.items_extracted);
    println!("  Detail batches: {}", summary.batches);
    println!(
        "  Fetch attempts: {} ({} gave up)",
        summary.fetch_attempts, summary.fetch_failures
    );
    println!(
        "  Records written: {} in {:.2} seconds",
        summary.records_written,
        summary.elapsed.as_secs_f64()
    );
    println!(
        "  Output: {} ({:.2} MB)",
        summary.output_path.display(),
        summary.output_megabytes()
    );
    println!();
}
