//! Aggregator configuration with documented defaults.
//!
//! [`AggregatorConfig`] is passed to [`crate::SearchAggregator::new`] once and
//! never re-read from the environment afterwards. It can be built in code,
//! loaded from a TOML file, or left at its defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Default per-attempt timeout for source requests.
pub const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 10_000;

/// Default timeout for the conversion service.
pub const DEFAULT_NORMALIZER_TIMEOUT_MS: u64 = 1_000;

/// Default text-conversion endpoint.
pub const DEFAULT_CONVERT_ENDPOINT: &str = "https://api.zhconvert.org/convert";

/// Simulated desktop browser User-Agent sent to every source by default.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default `Accept` header sent to every source.
pub const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// Top-level configuration for a [`crate::SearchAggregator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Timeout for a single source request attempt, in milliseconds.
    /// Covers connecting, response headers and reading the body.
    pub source_timeout_ms: u64,
    /// Maximum number of source requests in flight at once.
    /// `None` means one concurrent task per source with no cap.
    pub max_concurrency: Option<usize>,
    /// Default `User-Agent` header. Sources may override it.
    pub user_agent: String,
    /// Default `Accept` header. Sources may override it.
    pub accept: String,
    /// Retry policy for transient source failures.
    pub retry: RetryConfig,
    /// Query normalization settings.
    pub normalizer: NormalizerConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            source_timeout_ms: DEFAULT_SOURCE_TIMEOUT_MS,
            max_concurrency: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            accept: DEFAULT_ACCEPT.to_owned(),
            retry: RetryConfig::default(),
            normalizer: NormalizerConfig::default(),
        }
    }
}

/// Bounded exponential backoff for transient source failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. `0` disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds. Doubles per retry.
    pub initial_delay_ms: u64,
    /// Upper bound for a single backoff delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Randomise each delay within `[delay / 2, delay]`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 500,
            max_delay_ms: 4_000,
            jitter: true,
        }
    }
}

/// Settings for the remote traditional→simplified conversion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// When `false`, queries are only trimmed and never sent anywhere.
    pub enabled: bool,
    /// Conversion endpoint. Receives `converter` and `text` query parameters.
    pub endpoint: String,
    /// Converter mode passed to the service.
    pub converter: String,
    /// Hard timeout for the conversion call, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_CONVERT_ENDPOINT.to_owned(),
            converter: "Simplified".to_owned(),
            timeout_ms: DEFAULT_NORMALIZER_TIMEOUT_MS,
        }
    }
}

impl AggregatorConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `source_timeout_ms` must be greater than 0
    /// - `normalizer.timeout_ms` must be greater than 0 and below `source_timeout_ms`
    /// - `max_concurrency`, when set, must be greater than 0
    /// - `retry.initial_delay_ms` must be <= `retry.max_delay_ms`
    /// - `user_agent` must not be blank
    /// - `normalizer.endpoint` must be an absolute URL when the normalizer is enabled
    pub fn validate(&self) -> Result<()> {
        if self.source_timeout_ms == 0 {
            return Err(SearchError::Config(
                "source_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.normalizer.timeout_ms == 0 {
            return Err(SearchError::Config(
                "normalizer.timeout_ms must be greater than 0".into(),
            ));
        }
        if self.normalizer.timeout_ms >= self.source_timeout_ms {
            return Err(SearchError::Config(
                "normalizer.timeout_ms must be shorter than source_timeout_ms".into(),
            ));
        }
        if self.max_concurrency == Some(0) {
            return Err(SearchError::Config(
                "max_concurrency must be greater than 0 when set".into(),
            ));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(SearchError::Config(
                "retry.initial_delay_ms must be <= retry.max_delay_ms".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(SearchError::Config("user_agent must not be empty".into()));
        }
        if self.normalizer.enabled {
            url::Url::parse(&self.normalizer.endpoint).map_err(|e| {
                SearchError::Config(format!(
                    "normalizer.endpoint is not a valid URL ({}): {e}",
                    self.normalizer.endpoint
                ))
            })?;
        }
        Ok(())
    }

    /// Parse a configuration from TOML text. Missing fields take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SearchError::Config(e.to_string()))
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SearchError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }
}
