//! Anti-bot relay protocol
//!
//! The relay renders a target page on our behalf. A request is a JSON
//! `request.get` command POSTed to the relay endpoint; the response carries a
//! status field and, on success, the rendered page inside a solution object.

use crate::crawler::fetcher::FetchRequest;
use crate::{FetchError, IndexerError};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// `maxTimeout` sent when no relay settings say otherwise
pub const DEFAULT_RELAY_MAX_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Serialize)]
struct RelayCommand<'a> {
    cmd: &'static str,
    url: &'a str,
    #[serde(rename = "maxTimeout")]
    max_timeout: u64,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    solution: Option<RelaySolution>,
}

#[derive(Debug, Deserialize)]
struct RelaySolution {
    response: String,
}

/// Checks that the relay answers at all
///
/// A 200 or 405 status means the relay is reachable; anything else, including
/// a transport error, is a fatal availability error for the run.
pub async fn probe_relay(client: &Client, endpoint: &str) -> Result<(), IndexerError> {
    let unavailable = |reason: String| IndexerError::RelayUnavailable {
        url: endpoint.to_string(),
        reason,
    };

    let response = client
        .get(endpoint)
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                unavailable("timed out".to_string())
            } else {
                unavailable(e.to_string())
            }
        })?;

    match response.status() {
        StatusCode::OK | StatusCode::METHOD_NOT_ALLOWED => {
            tracing::info!("Relay at {} is reachable", endpoint);
            Ok(())
        }
        status => Err(unavailable(format!("returned status {}", status.as_u16()))),
    }
}

/// Submits one `request.get` command and returns the rendered page
///
/// Any status other than `"ok"`, a malformed body, or a transport error is
/// reported as a [`FetchError`] and retried like any other failed attempt.
pub async fn relay_get(
    client: &Client,
    endpoint: &str,
    max_timeout_ms: u64,
    request: &FetchRequest,
) -> Result<String, FetchError> {
    let url = request.url.as_str();
    let command = RelayCommand {
        cmd: "request.get",
        url,
        max_timeout: max_timeout_ms,
    };

    let response = client
        .post(endpoint)
        .timeout(request.timeout)
        .json(&command)
        .send()
        .await
        .map_err(|e| classify_transport_error(url, request.timeout, e))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| classify_transport_error(url, request.timeout, e))?;

    let decoded: RelayResponse = match serde_json::from_str(&text) {
        Ok(decoded) => decoded,
        Err(_) if !status.is_success() => {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
        Err(e) => {
            return Err(FetchError::RelayDecode {
                url: url.to_string(),
                message: e.to_string(),
            })
        }
    };

    if decoded.status != "ok" {
        tracing::debug!("Full relay response for {}: {}", url, text);
        return Err(FetchError::Relay {
            url: url.to_string(),
            status: decoded.status,
            message: decoded.message,
        });
    }

    decoded
        .solution
        .map(|solution| solution.response)
        .ok_or_else(|| FetchError::RelayDecode {
            url: url.to_string(),
            message: "status 'ok' without a solution".to_string(),
        })
}

pub(crate) fn classify_transport_error(
    url: &str,
    timeout: Duration,
    error: reqwest::Error,
) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
