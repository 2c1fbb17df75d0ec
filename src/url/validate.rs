use crate::UrlError;
use std::net::IpAddr;
use url::Url;

/// Common limit used by browsers
pub const MAX_URL_LENGTH: usize = 2083;

const MAX_DOMAIN_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;

/// Validates a configured endpoint URL
///
/// A valid URL is at most [`MAX_URL_LENGTH`] characters, uses the `http` or
/// `https` scheme, and names a host that is an IP address, `localhost`, or a
/// dotted domain name (see [`validate_host`]).
///
/// # Examples
///
/// ```
/// use catalog_indexer::url::validate_url;
///
/// assert!(validate_url("http://localhost:8191/v1").is_ok());
/// assert!(validate_url("https://yts.mx/api/v2/list_movies.json").is_ok());
/// assert!(validate_url("ftp://example.com").is_err());
/// ```
pub fn validate_url(raw: &str) -> Result<Url, UrlError> {
    if raw.len() > MAX_URL_LENGTH {
        return Err(UrlError::TooLong {
            max: MAX_URL_LENGTH,
        });
    }

    let url = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?;
    validate_host(host)?;

    Ok(url)
}

/// Validates a host: an IP address, `localhost`, or a domain name
///
/// Domain names need at least two labels; every label is 1-63 ASCII
/// alphanumerics or hyphens and neither starts nor ends with a hyphen.
pub fn validate_host(host: &str) -> Result<(), UrlError> {
    if host.is_empty() {
        return Err(UrlError::MissingHost);
    }

    if host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
    {
        return Ok(());
    }

    if host.eq_ignore_ascii_case("localhost") {
        return Ok(());
    }

    if host.len() > MAX_DOMAIN_LENGTH {
        return Err(UrlError::InvalidHost(format!(
            "domain longer than {} characters",
            MAX_DOMAIN_LENGTH
        )));
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err(UrlError::InvalidHost(format!(
            "'{}' needs at least two labels",
            host
        )));
    }

    for label in labels {
        let valid = !label.is_empty()
            && label.len() <= MAX_LABEL_LENGTH
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-');

        if !valid {
            return Err(UrlError::InvalidHost(format!(
                "invalid domain label '{}'",
                label
            )));
        }
    }

    Ok(())
}
