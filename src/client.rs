//! HTTP client for the external wellness platform (reqwest-based).
//!
//! Issues bearer-authenticated JSON requests, classifies responses into the
//! [`TransportError`] taxonomy, and retries transient network failures with
//! bounded exponential backoff.

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{TransportError, TransportResult};
use crate::retry::RetryPolicy;

/// HTTP client for the external platform's record feed.
#[derive(Debug, Clone)]
pub struct ExternalApiClient {
    /// Base URL of the external platform (trailing slash stripped).
    base_url: String,
    /// Bearer token sent on every request.
    api_key: String,
    /// Underlying HTTP client.
    http_client: Client,
    /// Backoff policy for transient failures.
    retry: RetryPolicy,
}

impl ExternalApiClient {
    /// Build a client from the engine configuration.
    pub fn new(config: &SyncConfig) -> TransportResult<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .user_agent("wellness-sync/0.1")
            .build()
            .map_err(|e| {
                TransportError::InvalidConfig(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http_client,
            retry: RetryPolicy::new(config.retry_attempts, 2),
        })
    }

    /// Create a client with a pre-built `reqwest::Client` and retry policy
    /// (for testing).
    #[must_use]
    pub fn with_http_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http_client: Client,
        retry: RetryPolicy,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http_client,
            retry,
        }
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of raw contact records (`GET /contacts`).
    ///
    /// Records are returned unparsed so the reconciler can isolate malformed
    /// entries individually.
    pub async fn fetch_contacts(&self, limit: u32, offset: u32) -> TransportResult<Vec<Value>> {
        self.fetch_page("/contacts", limit, offset).await
    }

    /// Fetch one page of raw booking records (`GET /bookings`).
    pub async fn fetch_bookings(&self, limit: u32, offset: u32) -> TransportResult<Vec<Value>> {
        self.fetch_page("/bookings", limit, offset).await
    }

    async fn fetch_page(&self, path: &str, limit: u32, offset: u32) -> TransportResult<Vec<Value>> {
        let params = serde_json::json!({ "limit": limit, "offset": offset });
        let body = self.request(Method::GET, path, Some(&params)).await?;
        match body {
            Value::Array(records) => Ok(records),
            other => Err(TransportError::Protocol(format!(
                "expected a JSON array of records from {path}, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Issue one request with retry, returning the parsed JSON body.
    ///
    /// `GET` encodes `params` as a query string; mutating methods serialize
    /// them as a JSON body. Only timeouts and connection failures are
    /// retried; response classification errors propagate immediately.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: Option<&Value>,
    ) -> TransportResult<Value> {
        let operation = format!("{method} {path}");
        self.retry
            .execute(&operation, || self.send_once(method.clone(), path, params))
            .await
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        params: Option<&Value>,
    ) -> TransportResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("external API {} {}", method, url);

        let mut builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json");

        if let Some(params) = params {
            if method == Method::GET {
                builder = builder.query(&query_pairs(params));
            } else {
                builder = builder.json(params);
            }
        }

        let response = builder.send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response(response: reqwest::Response) -> TransportResult<Value> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body).map_err(|e| {
                TransportError::Protocol(format!("invalid JSON response: {e}"))
            });
        }

        // Rate-limit hint, if the platform sends one.
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TransportError::Auth(body)),
            StatusCode::NOT_FOUND => Err(TransportError::NotFound(body)),
            StatusCode::TOO_MANY_REQUESTS => Err(TransportError::RateLimited {
                retry_after_secs: retry_after,
            }),
            s if s.is_server_error() => Err(TransportError::Server {
                status: s.as_u16(),
                body,
            }),
            s => Err(TransportError::Protocol(format!(
                "unexpected response: HTTP {s} - {body}"
            ))),
        }
    }
}

/// Flatten a JSON object into query string pairs.
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    match params {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_renders_scalars() {
        let params = serde_json::json!({ "limit": 100, "offset": 0, "kind": "contact" });
        let mut pairs = query_pairs(&params);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("kind".to_string(), "contact".to_string()),
                ("limit".to_string(), "100".to_string()),
                ("offset".to_string(), "0".to_string()),
            ]
        );
    }

    #[test]
    fn test_base_url_normalized() {
        let client = ExternalApiClient::with_http_client(
            "https://api.example.com/",
            "key",
            Client::new(),
            RetryPolicy::new(0, 0),
        );
        assert_eq!(client.base_url(), "https://api.example.com");
    }
}
