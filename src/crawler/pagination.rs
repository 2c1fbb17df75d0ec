//! Pagination discovery
//!
//! The first listing page is fetched once, up front. Its body yields the total
//! page count and is handed on to the listing stage so page 1 is never fetched
//! twice.

use crate::crawler::fetcher::RetryingFetcher;
use crate::indexers::Indexer;
use crate::IndexerError;
use std::sync::Arc;

/// Largest page count accepted from a catalog
pub const MAX_LISTING_PAGES: u32 = 100_000;

/// Page count of a catalog plus the body it was read from
#[derive(Debug, Clone)]
pub struct Pagination {
    pub total_pages: u32,
    pub first_page_url: String,
    pub first_page: Arc<str>,
}

/// Fetches listing page 1 and reads the total page count off it
///
/// # Errors
///
/// * [`IndexerError::FirstPageUnavailable`] if every attempt to fetch page 1
///   failed
/// * [`IndexerError::PaginationUndiscoverable`] if the indexer cannot read a
///   page count from the body, or reads one above [`MAX_LISTING_PAGES`]
pub async fn discover_pages(
    fetcher: &RetryingFetcher,
    indexer: &dyn Indexer,
) -> Result<Pagination, IndexerError> {
    let url = indexer.listing_url(1);
    tracing::info!("Discovering page count from {}", url);

    let first_page = fetcher
        .fetch_url(&url)
        .await
        .ok_or_else(|| IndexerError::FirstPageUnavailable {
            url: url.clone(),
            attempts: fetcher.policy().max_attempts,
        })?;

    let total_pages = indexer.page_count(&first_page).map_err(|e| {
        IndexerError::PaginationUndiscoverable {
            url: url.clone(),
            reason: e.to_string(),
        }
    })?;

    if total_pages > MAX_LISTING_PAGES {
        return Err(IndexerError::PaginationUndiscoverable {
            url,
            reason: format!(
                "reported {} pages, more than the maximum of {}",
                total_pages, MAX_LISTING_PAGES
            ),
        });
    }

    if total_pages == 0 {
        tracing::warn!("{} reports no listing pages", url);
    } else {
        tracing::info!("Found {} listing pages", total_pages);
    }

    Ok(Pagination {
        total_pages,
        first_page_url: url,
        first_page,
    })
}
