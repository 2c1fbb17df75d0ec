use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the indexer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub output: OutputConfig,
    pub fetch: FetchConfig,
    #[serde(default)]
    pub relay: Option<RelayConfig>,
    #[serde(default, rename = "indexer")]
    pub indexers: Vec<IndexerEntry>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Default level when no verbosity flag is given
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory receiving `main.log`; stderr only when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            path: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory the dataset files are written to
    pub dir: PathBuf,
}

/// Global fetch behaviour, overridable per indexer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Attempts per logical fetch
    pub max_retries: u32,

    /// Force `max_retries` onto every indexer, ignoring their overrides
    #[serde(default)]
    pub use_as_global_max_retries: bool,

    /// Maximum number of in-flight plain fetches
    pub concurrency_limit: u32,

    /// Force `concurrency_limit` onto every indexer, ignoring their overrides
    #[serde(default)]
    pub use_as_global_concurrency_limit: bool,

    /// Timeout for a single attempt (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// One backoff time unit (milliseconds); attempt n sleeps 2^n units
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

/// Anti-bot relay configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayConfig {
    /// Relay endpoint receiving `request.get` commands
    pub url: String,

    /// Maximum number of in-flight relay-bound fetches
    pub concurrency_limit: u32,

    /// `maxTimeout` forwarded to the relay (milliseconds)
    #[serde(default = "default_relay_max_timeout_ms")]
    pub max_timeout_ms: u64,

    /// HTTP timeout for one relay call (seconds)
    #[serde(default = "default_relay_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_relay_max_timeout_ms() -> u64 {
    60_000
}

fn default_relay_request_timeout_secs() -> u64 {
    90
}

/// One configured indexer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexerEntry {
    /// Registry identifier (e.g. "yts")
    pub name: String,

    /// Base listing URL
    pub base_url: String,

    /// Route fetches through the relay
    #[serde(default)]
    pub use_relay: bool,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub settings: IndexerOverrides,
}

fn default_enabled() -> bool {
    true
}

/// Per-indexer script settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexerOverrides {
    pub max_retries: Option<u32>,
    pub concurrency_limit: Option<u32>,
    pub batch_size: Option<usize>,
    pub page_limit: Option<u32>,
    pub chunk_size: Option<usize>,
}

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Resolved relay settings handed to a run
#[derive(Debug, Clone, PartialEq)]
pub struct RelaySettings {
    pub url: String,
    pub concurrency_limit: usize,
    pub max_timeout_ms: u64,
    pub request_timeout: Duration,
}

/// The validated settings record for one indexer run
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerSettings {
    pub name: String,
    pub base_url: String,
    pub output_dir: PathBuf,
    pub max_attempts: u32,
    pub concurrency_limit: usize,
    pub batch_size: usize,
    pub page_limit: u32,
    pub chunk_size: usize,
    pub timeout: Duration,
    pub backoff_unit: Duration,
    pub relay: Option<RelaySettings>,
}

impl Config {
    /// Resolves the settings record for one indexer entry
    ///
    /// A per-indexer override wins unless the matching global flag is set;
    /// missing overrides fall back to the global value. Relay settings are
    /// attached only for indexers with `use-relay = true`.
    pub fn resolve(&self, entry: &IndexerEntry) -> IndexerSettings {
        let max_attempts = match entry.settings.max_retries {
            Some(n) if !self.fetch.use_as_global_max_retries => n,
            _ => self.fetch.max_retries,
        };
        let concurrency_limit = match entry.settings.concurrency_limit {
            Some(n) if !self.fetch.use_as_global_concurrency_limit => n,
            _ => self.fetch.concurrency_limit,
        };

        let relay = if entry.use_relay {
            self.relay.as_ref().map(|relay| RelaySettings {
                url: relay.url.clone(),
                concurrency_limit: relay.concurrency_limit as usize,
                max_timeout_ms: relay.max_timeout_ms,
                request_timeout: Duration::from_secs(relay.request_timeout_secs),
            })
        } else {
            None
        };

        IndexerSettings {
            name: entry.name.clone(),
            base_url: entry.base_url.clone(),
            output_dir: self.output.dir.clone(),
            max_attempts,
            concurrency_limit: concurrency_limit as usize,
            batch_size: entry.settings.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            page_limit: entry.settings.page_limit.unwrap_or(DEFAULT_PAGE_LIMIT),
            chunk_size: entry.settings.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            backoff_unit: Duration::from_millis(self.fetch.backoff_unit_ms),
            relay,
        }
    }

    /// Resolves the settings of every enabled indexer, in file order
    pub fn enabled_indexers(&self) -> Vec<IndexerSettings> {
        self.indexers
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| self.resolve(entry))
            .collect()
    }
}
