//! HTTP fetcher implementation
//!
//! This module handles all remote retrieval for a run, including:
//! - Building the HTTP client with a proper user agent string
//! - Plain GET requests and relay-bound `request.get` commands
//! - Bounded attempts with exponential backoff
//! - Response caching for relay-bound fetches

use crate::config::{IndexerSettings, RelaySettings};
use crate::crawler::cache::ResponseCache;
use crate::crawler::gate::{ConcurrencyGate, GatePermit};
use crate::crawler::relay::{classify_transport_error, relay_get, DEFAULT_RELAY_MAX_TIMEOUT_MS};
use crate::FetchError;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One logical fetch, immutable once issued
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Target page URL
    pub url: String,

    /// Relay endpoint, when the page is fetched through the relay
    pub relay: Option<String>,

    /// Timeout applied to each attempt
    pub timeout: Duration,

    /// Attempts before the fetch is reported absent
    pub max_attempts: u32,
}

/// Attempt bound and backoff schedule
///
/// Attempt `n` (0-indexed) that fails is followed by a sleep of
/// `2^n` backoff units, except after the final attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    /// Delay slept after failed attempt `attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(attempt.min(31)))
    }

    /// Every delay a fetch failing on all attempts sleeps, in order
    #[cfg(test)]
    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.backoff(attempt))
            .collect()
    }
}

/// Builds the HTTP client shared by every fetch of a run
///
/// # Example
///
/// ```no_run
/// use catalog_indexer::crawler::build_http_client;
///
/// let client = build_http_client("catalog-indexer/1.0").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs logical fetches with bounded attempts and exponential backoff
///
/// Each attempt holds a slot of the matching [`ConcurrencyGate`] only for the
/// duration of its network call. Relay-bound fetches go through the run's
/// [`ResponseCache`], so a URL is rendered by the relay at most once per run.
#[derive(Debug)]
pub struct RetryingFetcher {
    client: Client,
    gate: ConcurrencyGate,
    relay: Option<(RelaySettings, ConcurrencyGate)>,
    cache: Arc<ResponseCache>,
    policy: RetryPolicy,
    timeout: Duration,
    attempts: AtomicU64,
    failures: AtomicU64,
}

impl RetryingFetcher {
    /// Creates a fetcher for one run from its settings record
    pub fn new(client: Client, settings: &IndexerSettings, cache: Arc<ResponseCache>) -> Self {
        let relay = settings.relay.clone().map(|relay| {
            let gate = ConcurrencyGate::new("relay", relay.concurrency_limit);
            (relay, gate)
        });

        Self {
            client,
            gate: ConcurrencyGate::new("fetch", settings.concurrency_limit),
            relay,
            cache,
            policy: RetryPolicy {
                max_attempts: settings.max_attempts.max(1),
                backoff_unit: settings.backoff_unit,
            },
            timeout: settings.timeout,
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Builds the request this fetcher would issue for `url`
    pub fn request(&self, url: &str) -> FetchRequest {
        match &self.relay {
            Some((relay, _)) => FetchRequest {
                url: url.to_string(),
                relay: Some(relay.url.clone()),
                timeout: relay.request_timeout,
                max_attempts: self.policy.max_attempts,
            },
            None => FetchRequest {
                url: url.to_string(),
                relay: None,
                timeout: self.timeout,
                max_attempts: self.policy.max_attempts,
            },
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Total network attempts issued so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Logical fetches that exhausted their attempts
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Fetches `url` with this fetcher's defaults
    pub async fn fetch_url(&self, url: &str) -> Option<Arc<str>> {
        let request = self.request(url);
        self.fetch(&request).await
    }

    /// Performs one logical fetch
    ///
    /// Returns the raw body, or `None` once every attempt failed. Absence is
    /// not an error here; callers decide whether it is fatal.
    pub async fn fetch(&self, request: &FetchRequest) -> Option<Arc<str>> {
        if request.relay.is_some() {
            self.cache
                .get_or_fetch(&request.url, || self.fetch_with_retries(request))
                .await
        } else {
            self.fetch_with_retries(request).await.map(Arc::from)
        }
    }

    async fn fetch_with_retries(&self, request: &FetchRequest) -> Option<String> {
        let max_attempts = request.max_attempts.max(1);

        let (gate, max_timeout_ms) = self.gate_for(request);

        for attempt in 0..max_attempts {
            let Some(permit) = gate.acquire().await else {
                tracing::error!("Concurrency gate closed while fetching {}", request.url);
                break;
            };

            match self.attempt(request, max_timeout_ms, permit).await {
                Ok(body) => {
                    if attempt > 0 {
                        tracing::debug!(
                            "Fetched {} on attempt {}/{}",
                            request.url,
                            attempt + 1,
                            max_attempts
                        );
                    }
                    return Some(body);
                }
                Err(e) => {
                    tracing::warn!("Attempt {}/{} failed: {}", attempt + 1, max_attempts, e);
                }
            }

            if attempt + 1 < max_attempts {
                let delay = self.policy.backoff(attempt);
                tracing::debug!("Backing off {:?} before retrying {}", delay, request.url);
                tokio::time::sleep(delay).await;
            }
        }

        self.failures.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            "Giving up on {} after {} attempts",
            request.url,
            max_attempts
        );
        None
    }

    /// Gate and relay `maxTimeout` matching the request's route
    fn gate_for(&self, request: &FetchRequest) -> (&ConcurrencyGate, u64) {
        match (&request.relay, &self.relay) {
            (Some(_), Some((relay, relay_gate))) => (relay_gate, relay.max_timeout_ms),
            _ => (&self.gate, DEFAULT_RELAY_MAX_TIMEOUT_MS),
        }
    }

    /// Issues a single network call; the gate slot is released on return
    async fn attempt(
        &self,
        request: &FetchRequest,
        max_timeout_ms: u64,
        _permit: GatePermit,
    ) -> Result<String, FetchError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        match &request.relay {
            Some(endpoint) => relay_get(&self.client, endpoint, max_timeout_ms, request).await,
            None => self.get(request).await,
        }
    }

    async fn get(&self, request: &FetchRequest) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| classify_transport_error(&request.url, request.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| classify_transport_error(&request.url, request.timeout, e))
    }
}
