//! YTS movie catalog (JSON API)
//!
//! Listing pages are `list_movies` API responses; every movie object is a
//! complete record, so there is no detail stage. The dataset is large and is
//! written newline-delimited.

use crate::config::IndexerSettings;
use crate::indexers::{ExtractionError, Indexer, ListingItem, Record};
use crate::output::OutputFormat;
use crate::ConfigError;
use serde_json::Value;

pub(crate) const NAME: &str = "yts";

/// Indexer for the YTS `list_movies` endpoint
#[derive(Debug, Clone)]
pub struct YtsIndexer {
    base_url: String,
    page_limit: u32,
}

impl YtsIndexer {
    pub fn new(settings: &IndexerSettings) -> Result<Self, ConfigError> {
        if settings.page_limit == 0 {
            return Err(ConfigError::Validation(
                "yts page-limit must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            base_url: settings.base_url.clone(),
            page_limit: settings.page_limit,
        })
    }
}

/// Number of pages needed to list `total_items` at `page_size` per page
pub fn pages_for(total_items: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

fn parse(body: &str) -> Result<Value, ExtractionError> {
    Ok(serde_json::from_str(body)?)
}

impl Indexer for YtsIndexer {
    fn name(&self) -> &str {
        NAME
    }

    fn listing_url(&self, page: u32) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}limit={}&page={}",
            self.base_url, separator, self.page_limit, page
        )
    }

    fn page_count(&self, first_page: &str) -> Result<u32, ExtractionError> {
        let response = parse(first_page)?;
        let count = response
            .pointer("/data/movie_count")
            .ok_or_else(|| ExtractionError::MissingField("data.movie_count".to_string()))?;

        let total_movies = count.as_u64().ok_or_else(|| ExtractionError::InvalidValue {
            field: "data.movie_count".to_string(),
            value: count.to_string(),
        })?;

        let total_pages = pages_for(total_movies, self.page_limit);
        tracing::info!(
            "Total movies: {}, Total pages: {}",
            total_movies,
            total_pages
        );
        Ok(total_pages)
    }

    fn extract_listing(
        &self,
        page_url: &str,
        body: &str,
    ) -> Result<Vec<ListingItem>, ExtractionError> {
        let response = parse(body)?;

        let movies = match response.pointer("/data/movies") {
            Some(Value::Array(movies)) => movies,
            _ => {
                tracing::warn!("No movies found on {}", page_url);
                return Ok(Vec::new());
            }
        };

        let items = movies
            .iter()
            .filter_map(|movie| match movie {
                Value::Object(fields) => Some(ListingItem::new(None, fields.clone())),
                other => {
                    tracing::debug!("Skipping non-object movie entry on {}: {}", page_url, other);
                    None
                }
            })
            .collect();

        Ok(items)
    }

    fn fetches_details(&self) -> bool {
        false
    }

    fn detail_url(&self, _item: &ListingItem) -> Option<String> {
        None
    }

    fn extract_detail(
        &self,
        item: &ListingItem,
        _detail_url: &str,
        _body: &str,
    ) -> Result<Record, ExtractionError> {
        Ok(item.clone().into_record())
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::JsonLines
    }

    fn output_file_name(&self) -> &str {
        "yts.jsonl"
    }
}
