//! Configuration management.
//!
//! The configuration mirrors the three concerns of a run: HTTP behavior
//! (`http`), term search (`search`) and batched fetch (`fetch`). Every field
//! has a default, so an empty file is a valid configuration.

mod file_config;

pub use file_config::{
    find_config_file, load_config, load_env_config, save_config, ConfigFileError,
};

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::FetchError;
use crate::utils::RetryPolicy;

/// Default E-utilities endpoint root
pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Requests per second allowed without an API key
pub const ANONYMOUS_RATE_LIMIT: i64 = 3;

/// Requests per second allowed with an API key
pub const KEYED_RATE_LIMIT: i64 = 10;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and retry settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Logging settings (read by the binary)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP behavior shared by search and fetch requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Lower backoff bound in seconds
    #[serde(default = "default_min_timeout")]
    pub min_timeout: f64,

    /// Upper backoff bound in seconds
    #[serde(default = "default_max_timeout")]
    pub max_timeout: f64,

    /// Status codes that make a search attempt retryable
    #[serde(default = "default_retry_on")]
    pub retry_on: Vec<u16>,

    /// NCBI API key (optional, raises the rate limit)
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    /// Verbose request logging
    #[serde(default)]
    pub debug: bool,

    /// E-utilities root URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt network timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            min_timeout: default_min_timeout(),
            max_timeout: default_max_timeout(),
            retry_on: default_retry_on(),
            api_key: default_api_key(),
            debug: false,
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl HttpConfig {
    /// API key, ignoring blank values
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Requests per second: 10 with an API key, 3 without
    pub fn rate_limit(&self) -> i64 {
        if self.api_key().is_some() {
            KEYED_RATE_LIMIT
        } else {
            ANONYMOUS_RATE_LIMIT
        }
    }

    pub fn min_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.min_timeout.max(0.0))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.max_timeout.max(0.0))
    }
}

fn default_min_timeout() -> f64 {
    1.0
}

fn default_max_timeout() -> f64 {
    2.0
}

fn default_retry_on() -> Vec<u16> {
    vec![429]
}

fn default_api_key() -> Option<String> {
    std::env::var("NCBI_API_KEY").ok()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Term search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Attempts per search page
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Page size (`retmax`) of each search request
    #[serde(default = "default_ids_per_request")]
    pub ids_per_request: usize,

    /// Terms OR-joined into one search chunk
    #[serde(default = "default_terms_per_request")]
    pub terms_per_request: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            ids_per_request: default_ids_per_request(),
            terms_per_request: default_terms_per_request(),
        }
    }
}

/// Batched fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Attempts per fetch batch
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// IDs per fetch batch
    #[serde(default = "default_ids_per_request")]
    pub ids_per_request: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            ids_per_request: default_ids_per_request(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_ids_per_request() -> usize {
    100
}

fn default_terms_per_request() -> usize {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `json` for structured output, plain text otherwise
    #[serde(default)]
    pub format: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Check every invariant the pipeline relies on.
    ///
    /// Runs before any request is issued, so a bad file fails fast.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.search.terms_per_request == 0 {
            return Err(FetchError::Config(
                "search.terms_per_request must be at least 1".to_string(),
            ));
        }
        if self.search.ids_per_request == 0 {
            return Err(FetchError::Config(
                "search.ids_per_request must be at least 1".to_string(),
            ));
        }
        if self.fetch.ids_per_request == 0 {
            return Err(FetchError::Config(
                "fetch.ids_per_request must be at least 1".to_string(),
            ));
        }
        if self.search.max_retries == 0 || self.fetch.max_retries == 0 {
            return Err(FetchError::Config(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if !self.http.min_timeout.is_finite()
            || !self.http.max_timeout.is_finite()
            || self.http.min_timeout < 0.0
        {
            return Err(FetchError::Config(format!(
                "invalid backoff bounds: min_timeout={}, max_timeout={}",
                self.http.min_timeout, self.http.max_timeout
            )));
        }
        if self.http.min_timeout > self.http.max_timeout {
            return Err(FetchError::Config(format!(
                "http.min_timeout ({}) exceeds http.max_timeout ({})",
                self.http.min_timeout, self.http.max_timeout
            )));
        }
        url::Url::parse(&self.http.base_url).map_err(|e| {
            FetchError::Config(format!("invalid http.base_url {:?}: {}", self.http.base_url, e))
        })?;
        Ok(())
    }

    /// Exponential backoff used for search pages
    pub fn search_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.search.max_retries,
            self.http.min_backoff(),
            self.http.max_backoff(),
        )
    }

    /// Randomized backoff used for fetch batches
    pub fn fetch_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::jittered(
            self.fetch.max_retries,
            self.http.min_backoff(),
            self.http.max_backoff(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyless() -> Config {
        let mut config = Config::default();
        config.http.api_key = None;
        config
    }

    #[test]
    fn test_default_config() {
        let config = keyless();
        assert_eq!(config.http.retry_on, vec![429]);
        assert_eq!(config.search.terms_per_request, 10);
        assert_eq!(config.search.ids_per_request, 100);
        assert_eq!(config.fetch.ids_per_request, 100);
        assert_eq!(config.fetch.max_retries, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_depends_on_api_key() {
        let mut config = keyless();
        assert_eq!(config.http.rate_limit(), 3);

        config.http.api_key = Some("secret".to_string());
        assert_eq!(config.http.rate_limit(), 10);

        config.http.api_key = Some("   ".to_string());
        assert_eq!(config.http.rate_limit(), 3);
    }

    #[test]
    fn test_validate_rejects_zero_chunks() {
        let mut config = keyless();
        config.search.terms_per_request = 0;
        assert!(matches!(config.validate(), Err(FetchError::Config(_))));

        let mut config = keyless();
        config.fetch.ids_per_request = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = keyless();
        config.http.min_timeout = 5.0;
        config.http.max_timeout = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = keyless();
        config.http.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
