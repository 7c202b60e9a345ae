//! Engine configuration.
//!
//! One explicit struct built at process start and passed by reference into
//! the transport client — no ambient global settings.

use thiserror::Error;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of retries after the first failed attempt.
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default page size for fetches from the external platform.
const DEFAULT_PAGE_SIZE: u32 = 100;

/// Configuration for the sync engine's transport client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the external platform API.
    pub base_url: String,

    /// Bearer token sent on every request.
    pub api_key: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Number of retries after the initial attempt for transient failures.
    pub retry_attempts: u32,

    /// Records requested per page when fetching from the platform.
    pub page_size: u32,
}

impl SyncConfig {
    /// Build a config with defaults for everything but the base URL and key.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_reader(|key| std::env::var(key))
    }

    /// Load configuration from a custom variable reader.
    ///
    /// This allows tests to supply variables without mutating process-global
    /// environment state.
    pub fn from_reader<F>(reader: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let base_url = reader("EXTERNAL_API_URL")
            .map_err(|_| ConfigError::MissingVar("EXTERNAL_API_URL".into()))?;

        let api_key = reader("EXTERNAL_API_KEY").unwrap_or_else(|_| "demo_key".to_string());

        let request_timeout_secs = match reader("EXTERNAL_API_TIMEOUT") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue("EXTERNAL_API_TIMEOUT".into(), e.to_string()))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let retry_attempts = match reader("EXTERNAL_API_RETRY_ATTEMPTS") {
            Ok(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("EXTERNAL_API_RETRY_ATTEMPTS".into(), e.to_string())
            })?,
            Err(_) => DEFAULT_RETRY_ATTEMPTS,
        };

        let page_size = match reader("EXTERNAL_API_PAGE_SIZE") {
            Ok(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("EXTERNAL_API_PAGE_SIZE".into(), e.to_string())
            })?,
            Err(_) => DEFAULT_PAGE_SIZE,
        };

        Ok(Self {
            base_url,
            api_key,
            request_timeout_secs,
            retry_attempts,
            page_size,
        })
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
