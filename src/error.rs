//! Transport error taxonomy for the external wellness platform API.
//!
//! Every failure raised by [`crate::client::ExternalApiClient`] is one of
//! these variants, so callers can branch on the kind of failure without
//! knowing HTTP status codes.

use thiserror::Error;

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised while talking to the external platform.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Client-side configuration problem (bad base URL, unbuildable client).
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// 401 or 403 from the external platform.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// 404 from the external platform.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// 429 from the external platform, with the `Retry-After` hint if sent.
    #[error("rate limit exceeded (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// 5xx from the external platform.
    #[error("server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    /// Unexpected status code, a 2xx body that failed to parse as JSON, or a
    /// request that could not be constructed at all.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The request timed out before a response arrived.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Retries exhausted; wraps the last underlying cause and attempt count.
    #[error("request failed after {attempts} attempt(s): {message}")]
    MaxAttemptsExceeded { attempts: u32, message: String },
}

impl TransportError {
    /// Whether this error is transient and worth retrying.
    ///
    /// Only timeouts and connection failures are retried; everything else
    /// (auth, protocol, server responses) fails the run immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }

    /// Whether this error came from a 5xx response.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server { .. })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            // Builder, request-construction, and decode failures are not
            // transient; retrying them would burn the whole backoff budget.
            Self::Protocol(err.to_string())
        }
    }
}
