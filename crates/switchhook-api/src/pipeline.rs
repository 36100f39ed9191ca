//! Webhook processing pipeline.
//!
//! A request moves through method check, authentication, body presence,
//! envelope parsing, device dispatch and persistence, in that order. The
//! first failing stage ends the request. Nothing is persisted unless every
//! earlier stage succeeded. The whole run is bounded by a deadline.

use std::{net::IpAddr, sync::Arc, time::Duration};

use axum::{
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use switchhook_core::{
    build_from_hub2_event, parse_envelope, DeviceType, EnvironmentRepository, PayloadError,
    SwitchBotWebhookEvent,
};
use tracing::{debug, info, instrument};

use crate::{
    auth::{AuthConfigSource, Authenticator, WebhookHeaders},
    error::WebhookError,
};

/// Message returned for every accepted webhook.
pub const SUCCESS_MESSAGE: &str = "Webhook processed successfully";

/// Default processing deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Body of an inbound request as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// No body, or a zero-length one.
    Absent,
    /// Raw body bytes.
    Present(Bytes),
    /// The body exceeded the size limit.
    TooLarge {
        /// Limit in bytes
        limit: usize,
    },
    /// The body stream failed before it was fully read.
    Unreadable {
        /// Transport error description
        reason: String,
    },
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::Absent
        } else {
            Self::Present(bytes)
        }
    }
}

/// Transport-independent view of an inbound webhook.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    /// HTTP method.
    pub method: Method,
    /// All request headers.
    pub headers: HeaderMap,
    /// Caller address, when known.
    pub source_ip: Option<IpAddr>,
    /// Request body.
    pub body: RequestBody,
}

/// Success response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    /// Always [`SUCCESS_MESSAGE`].
    pub message: String,
    /// Device discriminator of the accepted event.
    pub device_type: DeviceType,
    /// MAC address of the reporting device.
    pub device_mac: String,
}

impl WebhookAck {
    fn for_event(event: &SwitchBotWebhookEvent) -> Self {
        Self {
            message: SUCCESS_MESSAGE.to_string(),
            device_type: event.device_type(),
            device_mac: event.device_mac().to_string(),
        }
    }
}

/// Runs the webhook pipeline against its collaborators.
///
/// Cheap to clone and safe to share; it holds no per-request state.
#[derive(Clone)]
pub struct WebhookProcessor {
    authenticator: Authenticator,
    auth_source: Arc<dyn AuthConfigSource>,
    repository: Arc<dyn EnvironmentRepository>,
    deadline: Duration,
}

impl WebhookProcessor {
    /// Creates a processor.
    pub fn new(
        authenticator: Authenticator,
        auth_source: Arc<dyn AuthConfigSource>,
        repository: Arc<dyn EnvironmentRepository>,
    ) -> Self {
        Self { authenticator, auth_source, repository, deadline: DEFAULT_DEADLINE }
    }

    /// Sets the deadline for one [`handle`](Self::handle) run.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Returns the persistence collaborator.
    pub fn repository(&self) -> Arc<dyn EnvironmentRepository> {
        self.repository.clone()
    }

    /// Processes one webhook to its terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`WebhookError`] of the first stage that fails.
    #[instrument(name = "process_webhook", skip_all, fields(method = %request.method))]
    pub async fn process(&self, request: WebhookRequest) -> Result<WebhookAck, WebhookError> {
        if request.method != Method::POST {
            return Err(WebhookError::MethodNotAllowed(request.method.to_string()));
        }

        let headers = WebhookHeaders::from_header_map(&request.headers);
        let mode = self.authenticator.authenticate(
            &headers,
            request.source_ip,
            self.auth_source.as_ref(),
        )?;

        let body = match request.body {
            RequestBody::Present(bytes) => bytes,
            RequestBody::Absent => return Err(PayloadError::EmptyBody.into()),
            RequestBody::TooLarge { limit } => return Err(PayloadError::TooLarge { limit }.into()),
            RequestBody::Unreadable { reason } => {
                return Err(WebhookError::Internal(format!("request body unreadable: {reason}")));
            },
        };

        let envelope = parse_envelope(&body)?;
        let event = SwitchBotWebhookEvent::from_envelope(envelope)?;

        debug!(
            auth_mode = ?mode,
            device_type = %event.device_type(),
            device_mac = %event.device_mac(),
            "Webhook payload validated"
        );

        match &event {
            SwitchBotWebhookEvent::Hub2(hub2) => {
                let data = build_from_hub2_event(hub2)?;
                self.repository.save(&data).await?;
                info!(
                    device_id = %data.device_id(),
                    temperature = data.temperature(),
                    humidity = data.humidity(),
                    brightness = data.brightness(),
                    "Environment sample persisted"
                );
            },
            SwitchBotWebhookEvent::PlugMini(plug) => {
                info!(
                    device_mac = %plug.context.device_mac,
                    power_state = ?plug.context.power_state,
                    "Plug Mini event acknowledged without persistence"
                );
            },
        }

        Ok(WebhookAck::for_event(&event))
    }

    /// Processes one webhook within the deadline and renders the HTTP
    /// response.
    ///
    /// When the deadline passes the in-flight work, including a pending
    /// `save`, is dropped.
    pub async fn handle(&self, request: WebhookRequest) -> Response {
        let outcome = tokio::time::timeout(self.deadline, self.process(request))
            .await
            .unwrap_or_else(|_| Err(WebhookError::DeadlineExceeded { deadline: self.deadline }));

        match outcome {
            Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
            Err(e) => {
                e.log();
                e.into_response()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use switchhook_core::{CoreError, EnvironmentData, TestClock};

    use super::*;
    use crate::auth::{AuthPolicy, StaticAuthConfigSource};

    #[derive(Default)]
    struct Recording {
        saved: Mutex<Vec<EnvironmentData>>,
    }

    #[async_trait]
    impl EnvironmentRepository for Recording {
        async fn save(&self, data: &EnvironmentData) -> switchhook_core::Result<()> {
            self.saved.lock().unwrap().push(data.clone());
            Ok(())
        }
    }

    fn processor(repository: Arc<Recording>) -> WebhookProcessor {
        WebhookProcessor::new(
            Authenticator::new(AuthPolicy::default(), Arc::new(TestClock::new())),
            Arc::new(StaticAuthConfigSource::new(None)),
            repository,
        )
    }

    fn simple_request(method: Method, body: &str) -> WebhookRequest {
        WebhookRequest {
            method,
            headers: HeaderMap::new(),
            source_ip: Some("54.64.81.21".parse().unwrap()),
            body: Bytes::copy_from_slice(body.as_bytes()).into(),
        }
    }

    const HUB2: &str = r#"{"eventType":"changeReport","eventVersion":"1","context":{
        "deviceType":"WoHub2","deviceMac":"AA:BB:CC:DD:EE:FF","temperature":21.0,
        "humidity":40,"lightLevel":20,"scale":"CELSIUS","timeOfSample":1700000000}}"#;

    #[tokio::test]
    async fn method_is_checked_before_anything_else() {
        let repository = Arc::new(Recording::default());
        let mut request = simple_request(Method::GET, HUB2);
        request.source_ip = None;

        let result = processor(repository.clone()).process(request).await;

        assert!(matches!(result, Err(WebhookError::MethodNotAllowed(ref m)) if m == "GET"));
        assert!(repository.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hub2_is_persisted_and_acknowledged() {
        let repository = Arc::new(Recording::default());

        let ack = processor(repository.clone()).process(simple_request(Method::POST, HUB2)).await.unwrap();

        assert_eq!(ack.message, SUCCESS_MESSAGE);
        assert_eq!(ack.device_type, DeviceType::Hub2);
        let saved = repository.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].brightness(), 100.0);
    }

    #[tokio::test]
    async fn domain_violation_stops_before_persistence() {
        let repository = Arc::new(Recording::default());
        let body = HUB2.replace("21.0", "75.0");

        let result = processor(repository.clone()).process(simple_request(Method::POST, &body)).await;

        assert!(matches!(result, Err(WebhookError::Domain(_))));
        assert!(repository.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_body_is_reported_after_authentication() {
        let repository = Arc::new(Recording::default());
        let mut request = simple_request(Method::POST, HUB2);
        request.body = RequestBody::TooLarge { limit: 16 };

        let result = processor(repository).process(request).await;

        assert!(matches!(result, Err(WebhookError::Payload(PayloadError::TooLarge { limit: 16 }))));
    }

    #[tokio::test]
    async fn broken_body_stream_is_not_reported_as_too_large() {
        let mut request = simple_request(Method::POST, HUB2);
        request.body = RequestBody::Unreadable { reason: "connection reset".to_string() };

        let result = processor(Arc::new(Recording::default())).process(request).await;

        assert!(matches!(result, Err(WebhookError::Internal(ref m)) if m.contains("connection reset")));
    }

    #[tokio::test]
    async fn stalled_storage_hits_the_deadline() {
        struct Stalled;

        #[async_trait]
        impl EnvironmentRepository for Stalled {
            async fn save(&self, _: &EnvironmentData) -> switchhook_core::Result<()> {
                std::future::pending().await
            }
        }

        let processor = WebhookProcessor::new(
            Authenticator::new(AuthPolicy::default(), Arc::new(TestClock::new())),
            Arc::new(StaticAuthConfigSource::new(None)),
            Arc::new(Stalled),
        )
        .with_deadline(Duration::from_millis(50));

        let response = processor.handle(simple_request(Method::POST, HUB2)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"Internal server error"}"#);
    }

    #[tokio::test]
    async fn storage_failure_is_a_dependency_error() {
        struct Failing;

        #[async_trait]
        impl EnvironmentRepository for Failing {
            async fn save(&self, _: &EnvironmentData) -> switchhook_core::Result<()> {
                Err(CoreError::Database("connection reset".to_string()))
            }
        }

        let processor = WebhookProcessor::new(
            Authenticator::new(AuthPolicy::default(), Arc::new(TestClock::new())),
            Arc::new(StaticAuthConfigSource::new(None)),
            Arc::new(Failing),
        );

        let response = processor.handle(simple_request(Method::POST, HUB2)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
