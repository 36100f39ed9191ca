//! Test infrastructure for switchhook.
//!
//! Provides an in-memory repository with failure injection, SwitchBot
//! payload fixtures, signed request builders, and [`TestApp`], a fully wired
//! router driven with a deterministic clock.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::{net::IpAddr, sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use switchhook_api::{
    auth::{AuthConfig, AuthPolicy, Authenticator, StaticAuthConfigSource},
    pipeline::WebhookProcessor,
    server::{create_router, AppState},
};
pub use switchhook_core::{Clock, TestClock};
use tower::ServiceExt;

pub mod fixtures;
pub mod storage;

pub use fixtures::{
    hub2_payload, plug_mini_payload, WebhookRequestBuilder, HUB2_MAC, PLUG_MINI_MAC,
    SAMPLE_TIME_SECS, SWITCHBOT_IP, TEST_SECRET, TEST_TOKEN,
};
pub use storage::{FailureMode, MockEnvironmentRepository};

/// Wall-clock time the test clock starts at (2023-11-14T22:13:20Z).
pub const TEST_NOW_MS: i64 = SAMPLE_TIME_SECS * 1000;

/// Status and decoded JSON body of a response.
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status
    pub status: StatusCode,
    /// JSON body, or `Value::Null` when the body is not JSON
    pub body: Value,
    /// Raw response headers
    pub headers: axum::http::HeaderMap,
}

/// Router wired to a mock repository and a test clock.
pub struct TestApp {
    /// Router under test
    pub router: Router,
    /// Repository shared with the router
    pub repository: MockEnvironmentRepository,
    /// Clock shared with the authenticator
    pub clock: TestClock,
}

impl TestApp {
    /// App configured with the test credentials and default policy.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts a builder.
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    /// Sends a request and decodes the response.
    ///
    /// # Panics
    ///
    /// Panics if the router fails or the body cannot be read.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response =
            self.router.clone().oneshot(request).await.expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body readable");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body, headers }
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Configures a [`TestApp`].
#[derive(Debug, Clone)]
pub struct TestAppBuilder {
    credentials: Option<AuthConfig>,
    policy: AuthPolicy,
    request_timeout: Duration,
    max_payload_bytes: usize,
    trusted_proxies: Vec<IpAddr>,
    now_ms: i64,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            credentials: Some(AuthConfig {
                token: TEST_TOKEN.to_string(),
                secret: TEST_SECRET.to_string(),
            }),
            policy: AuthPolicy::default(),
            request_timeout: Duration::from_secs(5),
            max_payload_bytes: 64 * 1024,
            trusted_proxies: Vec::new(),
            now_ms: TEST_NOW_MS,
        }
    }
}

impl TestAppBuilder {
    /// Removes server-side credentials.
    #[must_use]
    pub fn without_credentials(mut self) -> Self {
        self.credentials = None;
        self
    }

    /// Overrides the authenticator policy.
    #[must_use]
    pub fn policy(mut self, policy: AuthPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overrides the whole-request deadline.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Overrides the body size limit.
    #[must_use]
    pub fn max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    /// Honours `X-Forwarded-For` from these peers.
    #[must_use]
    pub fn trusted_proxies(mut self, proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        self.trusted_proxies = proxies.into_iter().collect();
        self
    }

    /// Builds the app.
    pub fn build(self) -> TestApp {
        let repository = MockEnvironmentRepository::new();
        let clock = TestClock::at_millis(self.now_ms);
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

        let processor = WebhookProcessor::new(
            Authenticator::new(self.policy, shared_clock.clone()),
            Arc::new(StaticAuthConfigSource::new(self.credentials)),
            Arc::new(repository.clone()),
        )
        .with_deadline(self.request_timeout);

        let mut state = AppState::new(processor, shared_clock);
        state.max_payload_bytes = self.max_payload_bytes;
        state.trusted_proxies = self.trusted_proxies.into();

        TestApp { router: create_router(state), repository, clock }
    }
}
