//! 1337x movie catalog (HTML, fetched through the relay)
//!
//! Listing pages are `<base><page>` and carry one `<li>` per movie with a
//! modal summary. Detail pages hold the torrent table for one movie. Both are
//! rendered by the relay, so this indexer is normally configured with
//! `use-relay = true`.

use crate::config::IndexerSettings;
use crate::indexers::{ExtractionError, Indexer, ListingItem, Record};
use crate::output::OutputFormat;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::{json, Map, Value};
use url::Url;

pub(crate) const NAME: &str = "1337x";

/// Indexer for 1337x listing and detail pages
#[derive(Debug, Clone)]
pub struct LeetxIndexer {
    base_url: String,
    origin: Url,
}

/// One row of a detail page's torrent table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Torrent {
    pub name: String,
    pub link: String,
    pub subcategory: String,
    pub seeds: u64,
    pub leeches: u64,
    pub date: String,
    pub size: String,
    pub uploader: String,
}

impl LeetxIndexer {
    pub fn new(settings: &IndexerSettings) -> Result<Self, ConfigError> {
        let origin = Url::parse(&settings.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid 1337x base url '{}': {}", settings.base_url, e))
        })?;

        Ok(Self {
            base_url: settings.base_url.clone(),
            origin,
        })
    }
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|_| ExtractionError::Selector(css.to_string()))
}

/// All text below an element, trimmed
fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Only the element's own text nodes, trimmed
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text().map(|text| String::from(&**text)))
        .collect::<String>()
        .trim()
        .to_string()
}

fn first<'a>(scope: ElementRef<'a>, css: &Selector) -> Option<ElementRef<'a>> {
    scope.select(css).next()
}

/// Trailing numeric path segment of a pagination href (`/popular-movies/50/`)
fn page_from_href(href: &str) -> Option<u32> {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse().ok())
}

impl LeetxIndexer {
    fn extract_listing_item(
        &self,
        element: ElementRef<'_>,
        selectors: &ListingSelectors,
    ) -> Result<ListingItem, ExtractionError> {
        let anchor = first(element, &selectors.title)
            .ok_or_else(|| ExtractionError::MissingField("name".to_string()))?;
        let name = text_of(anchor);
        let link = anchor
            .value()
            .attr("href")
            .ok_or_else(|| ExtractionError::MissingField("link".to_string()))?
            .to_string();

        let summary = first(element, &selectors.summary)
            .map(text_of)
            .ok_or_else(|| ExtractionError::MissingField("summary".to_string()))?;

        let categories: Vec<String> = element.select(&selectors.category).map(text_of).collect();

        let style = first(element, &selectors.rating)
            .and_then(|rating| rating.value().attr("style"))
            .ok_or_else(|| ExtractionError::MissingField("rating_percentage".to_string()))?;
        let rating_percentage = style
            .split(':')
            .nth(1)
            .map(|value| value.trim().trim_end_matches(';').trim_end_matches('%').to_string())
            .ok_or_else(|| ExtractionError::InvalidValue {
                field: "rating_percentage".to_string(),
                value: style.to_string(),
            })?;

        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(name));
        fields.insert("summary".to_string(), Value::String(summary));
        fields.insert("categories".to_string(), json!(categories));
        fields.insert(
            "rating_percentage".to_string(),
            Value::String(rating_percentage),
        );

        Ok(ListingItem::new(Some(link), fields))
    }

    fn extract_torrent(&self, row: ElementRef<'_>, selectors: &TorrentSelectors) -> Torrent {
        let name_anchor = first(row, &selectors.name);
        let name = name_anchor
            .map(text_of)
            .unwrap_or_else(|| "Unknown Name".to_string());
        let link = name_anchor
            .and_then(|anchor| anchor.value().attr("href"))
            .unwrap_or_default()
            .to_string();

        let subcategory = first(row, &selectors.category)
            .and_then(|anchor| anchor.value().attr("href"))
            .and_then(|href| {
                let parts: Vec<&str> = href.split('/').collect();
                parts.len().checked_sub(3).map(|i| parts[i].to_string())
            })
            .unwrap_or_else(|| "Unknown Category".to_string());

        let count = |css: &Selector| {
            first(row, css)
                .map(own_text)
                .and_then(|text| text.parse::<u64>().ok())
                .unwrap_or(0)
        };
        let cell = |css: &Selector, default: &str| {
            first(row, css)
                .map(own_text)
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Torrent {
            name,
            link,
            subcategory,
            seeds: count(&selectors.seeds),
            leeches: count(&selectors.leeches),
            date: cell(&selectors.date, "Unknown Date"),
            size: cell(&selectors.size, "Unknown Size"),
            uploader: first(row, &selectors.uploader)
                .map(text_of)
                .unwrap_or_else(|| "Unknown Uploader".to_string()),
        }
    }
}

struct ListingSelectors {
    title: Selector,
    summary: Selector,
    category: Selector,
    rating: Selector,
}

impl ListingSelectors {
    fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            title: selector("div.modal-header h3 a")?,
            summary: selector("div.modal-body p")?,
            category: selector("div.category span")?,
            rating: selector("span.rating i")?,
        })
    }
}

struct TorrentSelectors {
    name: Selector,
    category: Selector,
    seeds: Selector,
    leeches: Selector,
    date: Selector,
    size: Selector,
    uploader: Selector,
}

impl TorrentSelectors {
    fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            name: selector("td.coll-1.name a:nth-of-type(2)")?,
            category: selector("td.coll-1.name a:nth-of-type(1)")?,
            seeds: selector("td.coll-2.seeds")?,
            leeches: selector("td.coll-3.leeches")?,
            date: selector("td.coll-date")?,
            size: selector("td.coll-4.size")?,
            uploader: selector("td.coll-5.uploader a")?,
        })
    }
}

impl Indexer for LeetxIndexer {
    fn name(&self) -> &str {
        NAME
    }

    fn listing_url(&self, page: u32) -> String {
        format!("{}{}", self.base_url, page)
    }

    fn page_count(&self, first_page: &str) -> Result<u32, ExtractionError> {
        let document = Html::parse_document(first_page);
        let links = selector("div.pagination li a")?;

        document
            .select(&links)
            .filter_map(|anchor| {
                text_of(anchor)
                    .parse::<u32>()
                    .ok()
                    .or_else(|| anchor.value().attr("href").and_then(page_from_href))
            })
            .max()
            .ok_or_else(|| ExtractionError::MissingField("pagination".to_string()))
    }

    fn extract_listing(
        &self,
        page_url: &str,
        body: &str,
    ) -> Result<Vec<ListingItem>, ExtractionError> {
        tracing::debug!("Extracting movie data from {}", page_url);
        let document = Html::parse_document(body);
        let entries = selector("main ul > li")?;
        let header = selector("div.modal-header")?;
        let selectors = ListingSelectors::new()?;

        let elements: Vec<ElementRef<'_>> = document
            .select(&entries)
            .filter(|li| first(*li, &header).is_some())
            .collect();

        if elements.is_empty() {
            tracing::warn!("No movie elements found on {}", page_url);
            return Ok(Vec::new());
        }
        tracing::debug!("Found {} movie elements to process", elements.len());

        let mut items = Vec::with_capacity(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            match self.extract_listing_item(element, &selectors) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(
                    "Skipping movie element {} on {}: {}",
                    index + 1,
                    page_url,
                    e
                ),
            }
        }

        Ok(items)
    }

    fn detail_url(&self, item: &ListingItem) -> Option<String> {
        let link = item.link.as_deref()?;
        match self.origin.join(link) {
            Ok(url) => Some(url.into()),
            Err(e) => {
                tracing::warn!("Cannot resolve detail link '{}': {}", link, e);
                None
            }
        }
    }

    fn extract_detail(
        &self,
        _item: &ListingItem,
        detail_url: &str,
        body: &str,
    ) -> Result<Record, ExtractionError> {
        let document = Html::parse_document(body);
        let root = document.root_element();

        let title = first(root, &selector("div.torrent-detail-info h3 a")?)
            .map(text_of)
            .unwrap_or_else(|| "Unknown Title".to_string());
        let summary = first(root, &selector("div.torrent-detail-info p")?)
            .map(text_of)
            .unwrap_or_else(|| "No description available".to_string());
        let categories: Vec<String> = root
            .select(&selector("div.torrent-category span")?)
            .map(text_of)
            .collect();

        let rows: Vec<ElementRef<'_>> = root
            .select(&selector("table.table-list tbody tr")?)
            .collect();
        if rows.is_empty() {
            return Err(ExtractionError::MissingField("torrents".to_string()));
        }

        let selectors = TorrentSelectors::new()?;
        let torrents: Vec<Torrent> = rows
            .into_iter()
            .map(|row| self.extract_torrent(row, &selectors))
            .collect();

        tracing::debug!(
            "Extracted '{}' with {} torrents from {}",
            title,
            torrents.len(),
            detail_url
        );

        Ok(json!({
            "title": title,
            "summary": summary,
            "categories": categories,
            "movie_page": detail_url,
            "torrents": torrents,
        }))
    }

    fn output_format(&self) -> OutputFormat {
        OutputFormat::JsonArray
    }

    fn output_file_name(&self) -> &str {
        "one_three_three_seven_x.json"
    }
}
