//! Site-specific indexers and their registry
//!
//! An indexer knows how to address a catalog's listing pages, read the page
//! count off the first one, and turn listing and detail bodies into records.
//! The engine drives the fetching; indexers only ever see raw bodies.

mod leetx;
mod yts;

pub use leetx::LeetxIndexer;
pub use yts::YtsIndexer;

use crate::config::IndexerSettings;
use crate::output::OutputFormat;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// A record written to the dataset; its shape belongs to the indexer
pub type Record = Value;

/// Errors raised while extracting data from a fetched body
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Missing field '{0}'")]
    MissingField(String),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid selector '{0}'")]
    Selector(String),

    #[error("Invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: String },
}

/// Summary entry extracted from a listing page
///
/// `link` references the item's detail page when the catalog has one; every
/// other extracted field lives in `summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(flatten)]
    pub summary: Map<String, Value>,
}

impl ListingItem {
    pub fn new(link: Option<String>, summary: Map<String, Value>) -> Self {
        Self { link, summary }
    }

    /// Converts the item into a dataset record, keeping the link if present
    pub fn into_record(self) -> Record {
        let mut fields = self.summary;
        if let Some(link) = self.link {
            fields.insert("link".to_string(), Value::String(link));
        }
        Value::Object(fields)
    }
}

/// Fetch/extract capability supplied by one catalog site
pub trait Indexer: Send + Sync {
    /// Registry identifier
    fn name(&self) -> &str;

    /// URL of listing page `page` (1-indexed)
    fn listing_url(&self, page: u32) -> String;

    /// Total number of listing pages, read off the first page
    fn page_count(&self, first_page: &str) -> Result<u32, ExtractionError>;

    /// Listing items on one listing page
    fn extract_listing(&self, page_url: &str, body: &str)
        -> Result<Vec<ListingItem>, ExtractionError>;

    /// Whether listing items are enriched from their detail pages
    ///
    /// When false, listing items are written as the final records.
    fn fetches_details(&self) -> bool {
        true
    }

    /// Detail page URL for an item, if it has one
    fn detail_url(&self, item: &ListingItem) -> Option<String> {
        item.link.clone()
    }

    /// Full record for one item from its detail page
    fn extract_detail(
        &self,
        item: &ListingItem,
        detail_url: &str,
        body: &str,
    ) -> Result<Record, ExtractionError>;

    fn output_format(&self) -> OutputFormat;

    /// File name of the dataset inside the output directory
    fn output_file_name(&self) -> &str;
}

/// Builds an indexer from its resolved settings
pub type IndexerFactory = fn(&IndexerSettings) -> Result<Arc<dyn Indexer>, ConfigError>;

/// Maps indexer identifiers to statically compiled implementations
#[derive(Clone, Default)]
pub struct IndexerRegistry {
    factories: BTreeMap<String, IndexerFactory>,
}

impl IndexerRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every shipped indexer
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(yts::NAME, |settings| {
            Ok(Arc::new(YtsIndexer::new(settings)?) as Arc<dyn Indexer>)
        });
        registry.register(leetx::NAME, |settings| {
            Ok(Arc::new(LeetxIndexer::new(settings)?) as Arc<dyn Indexer>)
        });
        registry
    }

    /// Adds or replaces an indexer
    pub fn register(&mut self, name: &str, factory: IndexerFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered identifiers, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiates the indexer registered under `settings.name`
    ///
    /// Returns `None` for unknown names.
    pub fn get(&self, settings: &IndexerSettings) -> Option<Result<Arc<dyn Indexer>, ConfigError>> {
        self.factories
            .get(&settings.name)
            .map(|factory| factory(settings))
    }
}

impl std::fmt::Debug for IndexerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerRegistry")
            .field("indexers", &self.names())
            .finish()
    }
}
