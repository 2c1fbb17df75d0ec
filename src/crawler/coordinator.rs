//! Run coordinator - orchestration of one indexer run
//!
//! A run goes through the same stages for every indexer:
//! - Checking the relay, when one is configured
//! - Discovering the listing page count
//! - Fetching and extracting every listing page
//! - Fetching and extracting detail pages in fixed-size batches
//! - Writing the dataset and reporting the run's counters

use crate::config::{Config, IndexerSettings};
use crate::crawler::cache::ResponseCache;
use crate::crawler::fetcher::{build_http_client, RetryingFetcher};
use crate::crawler::pagination::discover_pages;
use crate::crawler::relay::probe_relay;
use crate::crawler::scheduler::run_batched;
use crate::indexers::{Indexer, IndexerRegistry, ListingItem, Record};
use crate::output::{write_dataset, RunSummary};
use crate::IndexerError;
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;

/// User agent sent with every request
pub fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Drives one indexer through a complete run
pub struct Coordinator {
    settings: IndexerSettings,
    indexer: Arc<dyn Indexer>,
    client: Client,
    fetcher: RetryingFetcher,
}

impl Coordinator {
    /// Creates a coordinator with a fresh HTTP client and response cache
    ///
    /// # Arguments
    ///
    /// * `settings` - Resolved settings for this run
    /// * `indexer` - The indexer to drive
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(IndexerError)` - The HTTP client could not be built
    pub fn new(settings: IndexerSettings, indexer: Arc<dyn Indexer>) -> Result<Self, IndexerError> {
        let client = build_http_client(&default_user_agent())?;
        Ok(Self::with_client(settings, indexer, client))
    }

    /// Creates a coordinator around an existing client
    pub fn with_client(settings: IndexerSettings, indexer: Arc<dyn Indexer>, client: Client) -> Self {
        let fetcher = RetryingFetcher::new(client.clone(), &settings, Arc::new(ResponseCache::new()));
        Self {
            settings,
            indexer,
            client,
            fetcher,
        }
    }

    /// Runs every stage and writes the dataset
    ///
    /// Relay unavailability, an unfetchable first page, an undiscoverable page
    /// count and output failures abort the run before anything is persisted.
    /// Pages and items that cannot be fetched or extracted are logged and
    /// skipped.
    pub async fn run(&self) -> Result<RunSummary, IndexerError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let name = self.indexer.name().to_string();

        tracing::info!("Starting {} run against {}", name, self.settings.base_url);

        if let Some(relay) = &self.settings.relay {
            probe_relay(&self.client, &relay.url).await?;
        }

        let pagination = discover_pages(&self.fetcher, self.indexer.as_ref()).await?;
        let total_pages = pagination.total_pages;

        let pages = self.listing_stage(total_pages, pagination.first_page).await;
        let pages_processed = pages.len() as u32;
        let items: Vec<ListingItem> = pages.into_iter().flatten().collect();
        let items_extracted = items.len();
        tracing::info!(
            "Extracted {} items from {} of {} listing pages",
            items_extracted,
            pages_processed,
            total_pages
        );

        let (records, batches) = if self.indexer.fetches_details() {
            self.detail_stage(items).await
        } else {
            (items.into_iter().map(ListingItem::into_record).collect(), 0)
        };

        let records_written = records.len();
        let written = write_dataset(
            &self.settings.output_dir,
            self.indexer.output_file_name(),
            self.indexer.output_format(),
            records,
            self.settings.chunk_size,
        )
        .await?;

        let elapsed = start.elapsed();
        let summary = RunSummary {
            indexer: name,
            started_at,
            pages_discovered: total_pages,
            pages_processed,
            items_extracted,
            records_written,
            batches,
            fetch_attempts: self.fetcher.attempts(),
            fetch_failures: self.fetcher.failures(),
            elapsed,
            output_path: written.path,
            output_bytes: written.bytes,
        };

        tracing::info!(
            "Fetched and saved {} records in {:.2} seconds",
            summary.records_written,
            elapsed.as_secs_f64()
        );
        tracing::info!(
            "Output file size: {:.2} MB ({})",
            summary.output_megabytes(),
            summary.output_path.display()
        );

        Ok(summary)
    }

    /// Fetches listing pages 1..=total_pages, all in one batch
    ///
    /// Page 1 is served from the body already fetched during discovery.
    async fn listing_stage(&self, total_pages: u32, first_page: Arc<str>) -> Vec<Vec<ListingItem>> {
        let indexer = self.indexer.as_ref();
        let fetcher = &self.fetcher;
        let pages: Vec<u32> = (1..=total_pages).collect();

        let outcome = run_batched(pages, total_pages as usize, "listing", |page| {
            let first_page = first_page.clone();
            async move {
                let url = indexer.listing_url(page);
                let body = if page == 1 {
                    first_page
                } else {
                    fetcher.fetch_url(&url).await?
                };

                match indexer.extract_listing(&url, &body) {
                    Ok(items) => {
                        tracing::info!("Processed page {} of {}", page, total_pages);
                        Some(items)
                    }
                    Err(e) => {
                        tracing::warn!("Skipping listing page {}: {}", url, e);
                        None
                    }
                }
            }
        })
        .await;

        outcome.results
    }

    /// Fetches and extracts the detail page of every item, batch by batch
    async fn detail_stage(&self, items: Vec<ListingItem>) -> (Vec<Record>, usize) {
        let indexer = self.indexer.as_ref();
        let fetcher = &self.fetcher;

        let outcome = run_batched(items, self.settings.batch_size, "detail", |item| async move {
            let Some(url) = indexer.detail_url(&item) else {
                tracing::warn!("Skipping item without a detail page: {:?}", item.summary);
                return None;
            };

            let body = fetcher.fetch_url(&url).await?;
            match indexer.extract_detail(&item, &url, &body) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping detail page {}: {}", url, e);
                    None
                }
            }
        })
        .await;

        if outcome.dropped > 0 {
            tracing::warn!("Dropped {} items without a detail record", outcome.dropped);
        }

        (outcome.results, outcome.batches)
    }
}

/// Builds and runs the indexer registered under `settings.name`
pub async fn run_indexer(
    registry: &IndexerRegistry,
    settings: IndexerSettings,
) -> Result<RunSummary, IndexerError> {
    let indexer = registry
        .get(&settings)
        .ok_or_else(|| IndexerError::UnknownIndexer(settings.name.clone()))??;

    Coordinator::new(settings, indexer)?.run().await
}

/// Outcome of running every selected indexer
#[derive(Debug, Default)]
pub struct RunReport {
    pub summaries: Vec<RunSummary>,
    pub failures: Vec<(String, IndexerError)>,
    pub skipped: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs the enabled indexers of `config` one after another
///
/// `only`, when non-empty, restricts the run to the named indexers. Unknown
/// indexer names are logged and skipped; a failed run is logged and the next
/// indexer still runs.
pub async fn run_all(config: &Config, registry: &IndexerRegistry, only: &[String]) -> RunReport {
    let mut report = RunReport::default();

    for name in only {
        if !config.indexers.iter().any(|entry| &entry.name == name) {
            tracing::warn!("Indexer '{}' is not configured", name);
        }
    }

    for settings in config.enabled_indexers() {
        if !only.is_empty() && !only.contains(&settings.name) {
            continue;
        }

        let name = settings.name.clone();
        if !registry.contains(&name) {
            tracing::error!(
                "No indexer named '{}' (available: {})",
                name,
                registry.names().join(", ")
            );
            report.skipped.push(name);
            continue;
        }

        match run_indexer(registry, settings).await {
            Ok(summary) => report.summaries.push(summary),
            Err(e) => {
                tracing::error!("Indexer '{}' failed: {}", name, e);
                report.failures.push((name, e));
            }
        }
    }

    report
}
