use url::Url;

/// Normalizes a URL into the key used by the response cache
///
/// # Normalization Steps
///
/// 1. Parse the URL (lowercases scheme and host, resolves dot segments)
/// 2. Remove the fragment
/// 3. Sort query parameters by key, keeping their values
/// 4. Remove an empty query string
///
/// Strings that do not parse as URLs are used verbatim, trimmed.
///
/// # Examples
///
/// ```
/// use catalog_indexer::url::cache_key;
///
/// let key = cache_key("https://EXAMPLE.com/list?page=2&limit=20#top");
/// assert_eq!(key, "https://example.com/list?limit=20&page=2");
/// ```
pub fn cache_key(raw: &str) -> String {
    let raw = raw.trim();
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return raw.to_string(),
    };

    url.set_fragment(None);

    if url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if params.is_empty() {
            url.set_query(None);
        } else {
            // Stable sort keeps repeated keys in their original order
            params.sort_by(|a, b| a.0.cmp(&b.0));
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    url.into()
}
