//! Mock external wellness platform using wiremock.
//!
//! Simulates the `/contacts` and `/bookings` feed endpoints with success,
//! error, and pagination scenarios.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wellness_sync::retry::RetryPolicy;
use wellness_sync::store::MemoryStore;
use wellness_sync::{ExternalApiClient, SyncOrchestrator};

pub const TEST_API_KEY: &str = "test-token-123";

/// Install the tracing subscriber for test output, once per test binary.
///
/// Respects `RUST_LOG`; defaults to the crate's debug output captured by the
/// test harness.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wellness_sync=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// A mock external platform serving contact and booking feeds.
pub struct MockExternalApi {
    server: MockServer,
}

impl MockExternalApi {
    pub async fn new() -> Self {
        init_test_tracing();
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// An `ExternalApiClient` pointed at this mock, with no retries.
    pub fn client(&self) -> ExternalApiClient {
        ExternalApiClient::with_http_client(
            self.uri(),
            TEST_API_KEY,
            reqwest::Client::new(),
            RetryPolicy::new(0, 0),
        )
    }

    /// A client with retries enabled and a short request timeout, for
    /// backoff scenarios.
    pub fn retrying_client(&self, max_retries: u32) -> ExternalApiClient {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .expect("failed to build test HTTP client");
        ExternalApiClient::with_http_client(
            self.uri(),
            TEST_API_KEY,
            http_client,
            RetryPolicy {
                max_retries,
                base_delay_secs: 0,
                max_delay_secs: 0,
            },
        )
    }

    /// An orchestrator wired to this mock and the given store.
    pub fn orchestrator(&self, store: &MemoryStore) -> SyncOrchestrator {
        SyncOrchestrator::with_client(
            Arc::new(self.client()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            100,
        )
    }

    /// Serve one page of contacts for any `/contacts` request.
    pub async fn mock_contacts(&self, records: Value) {
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(&self.server)
            .await;
    }

    /// Serve a specific page of contacts, keyed by offset.
    pub async fn mock_contacts_page(&self, offset: u32, records: Value) {
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(&self.server)
            .await;
    }

    /// Serve one page of bookings for any `/bookings` request.
    pub async fn mock_bookings(&self, records: Value) {
        Mock::given(method("GET"))
            .and(path("/bookings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(&self.server)
            .await;
    }

    /// Serve an error status for the given feed path.
    pub async fn mock_feed_error(&self, feed_path: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(feed_path))
            .respond_with(ResponseTemplate::new(status).set_body_string("upstream failure"))
            .mount(&self.server)
            .await;
    }
}

/// A well-formed external contact record.
pub fn contact_record(id: &str, name: &str, email: &str, phone: &str) -> Value {
    json!({ "id": id, "name": name, "email": email, "phone": phone })
}

/// A well-formed external booking record.
pub fn booking_record(id: &str, client_id: &str, time: &str) -> Value {
    json!({ "id": id, "client_id": client_id, "time": time })
}
