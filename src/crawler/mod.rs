//! Fetch-retry-extract-batch engine
//!
//! This module contains the indexing engine, including:
//! - HTTP and relay fetching with bounded retries
//! - Concurrency gates and the per-run response cache
//! - Pagination discovery and batch scheduling
//! - Overall run coordination

mod cache;
mod coordinator;
mod fetcher;
mod gate;
mod pagination;
mod relay;
mod scheduler;

pub use cache::ResponseCache;
pub use coordinator::{default_user_agent, run_all, run_indexer, Coordinator, RunReport};
pub use fetcher::{build_http_client, FetchRequest, RetryPolicy, RetryingFetcher};
pub use gate::{ConcurrencyGate, GatePermit};
pub use pagination::{discover_pages, Pagination, MAX_LISTING_PAGES};
pub use relay::{probe_relay, relay_get, DEFAULT_RELAY_MAX_TIMEOUT_MS};
pub use scheduler::{run_batched, BatchOutcome, BatchPlan};

pub use crate::output::RunSummary;
