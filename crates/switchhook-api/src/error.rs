//! Pipeline rejections and their HTTP mapping.
//!
//! Every stage of the webhook pipeline fails with a [`WebhookError`]. Each
//! variant belongs to exactly one [`ErrorKind`] and renders as
//! `{"error": <message>}` with a fixed public message, so storage errors,
//! signature material and parser internals never reach the client.

use std::{fmt, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use switchhook_core::{CoreError, DomainError, PayloadError};
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::SignatureFailure;

/// Classification of a rejection, used for status mapping and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or invalid input; never retried.
    Client,
    /// Signature, replay or origin check failed.
    Auth,
    /// Server-side credentials are missing.
    Config,
    /// Device reported values outside the business rules.
    Domain,
    /// The persistence collaborator failed.
    Dependency,
    /// Anything unexpected.
    Internal,
}

impl ErrorKind {
    /// Returns a stable lowercase label for log fields.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Auth => "auth",
            Self::Config => "config",
            Self::Domain => "domain",
            Self::Dependency => "dependency",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a rejected webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Anything other than POST.
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    /// Signature headers were sent but no credentials are configured.
    #[error("authentication configuration missing")]
    MissingAuthConfig,

    /// Secure-mode signature did not verify.
    #[error("signature verification failed: {0}")]
    InvalidSignature(SignatureFailure),

    /// Secure-mode timestamp outside the replay window.
    #[error("timestamp {timestamp_ms} outside replay window")]
    StaleTimestamp {
        /// Timestamp from the `t` header, in milliseconds
        timestamp_ms: i64,
    },

    /// Simple-mode caller is not on the allow-list.
    #[error("source address {source_ip} is not allow-listed")]
    ForbiddenSource {
        /// Caller address, or `unknown`
        source_ip: String,
    },

    /// Request body failed parsing or structural validation.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Parsed values violate a business rule.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The repository failed to persist.
    #[error("storage failure: {0}")]
    Storage(#[from] CoreError),

    /// Processing did not finish before the request deadline.
    #[error("processing exceeded deadline of {deadline:?}")]
    DeadlineExceeded {
        /// Configured deadline
        deadline: Duration,
    },

    /// Unexpected failure, including caught panics.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Public, human-readable message
    pub error: &'static str,
}

impl WebhookError {
    /// Returns the error class.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MethodNotAllowed(_) | Self::Payload(_) => ErrorKind::Client,
            Self::InvalidSignature(_) | Self::StaleTimestamp { .. } | Self::ForbiddenSource { .. } => {
                ErrorKind::Auth
            },
            Self::MissingAuthConfig => ErrorKind::Config,
            Self::Domain(_) => ErrorKind::Domain,
            Self::Storage(_) | Self::DeadlineExceeded { .. } => ErrorKind::Dependency,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status for this rejection.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidSignature(_) | Self::StaleTimestamp { .. } => StatusCode::UNAUTHORIZED,
            Self::ForbiddenSource { .. } => StatusCode::FORBIDDEN,
            Self::Payload(_) | Self::Domain(_) => StatusCode::BAD_REQUEST,
            Self::MissingAuthConfig
            | Self::Storage(_)
            | Self::DeadlineExceeded { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message placed in the response body.
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed(_) => "Method not allowed",
            Self::MissingAuthConfig => "Authentication configuration error",
            Self::InvalidSignature(_) => "Unauthorized",
            Self::StaleTimestamp { .. } => "Request too old",
            Self::ForbiddenSource { .. } => "Forbidden",
            Self::Payload(PayloadError::EmptyBody) => "Request body is required",
            Self::Payload(PayloadError::InvalidJson(_)) => "Invalid JSON payload",
            Self::Payload(PayloadError::InvalidEnvelope(_) | PayloadError::InvalidStructure { .. }) => {
                "Invalid webhook payload"
            },
            Self::Payload(PayloadError::UnsupportedDeviceType(_)) => "Unsupported device type",
            Self::Payload(PayloadError::TooLarge { .. }) => "Request body too large",
            Self::Domain(_) => "Invalid sensor data",
            Self::Storage(_) | Self::DeadlineExceeded { .. } | Self::Internal(_) => {
                "Internal server error"
            },
        }
    }

    /// Emits one log record for this rejection at a level matching its kind.
    pub fn log(&self) {
        let kind = self.kind();
        let status = self.status().as_u16();
        match kind {
            ErrorKind::Client | ErrorKind::Auth | ErrorKind::Domain => {
                warn!(error_kind = %kind, status, error = %self, "Webhook rejected");
            },
            ErrorKind::Config | ErrorKind::Dependency | ErrorKind::Internal => {
                error!(error_kind = %kind, status, error = %self, "Webhook processing failed");
            },
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse { error: self.public_message() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_errors_map_to_distinct_messages() {
        let cases = [
            (PayloadError::EmptyBody, "Request body is required"),
            (PayloadError::InvalidJson("eof".into()), "Invalid JSON payload"),
            (PayloadError::InvalidEnvelope("missing".into()), "Invalid webhook payload"),
            (PayloadError::UnsupportedDeviceType("Unknown".into()), "Unsupported device type"),
        ];

        for (payload_error, message) in cases {
            let err = WebhookError::from(payload_error);
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
            assert_eq!(err.kind(), ErrorKind::Client);
            assert_eq!(err.public_message(), message);
        }
    }

    #[test]
    fn domain_errors_are_bad_requests_of_their_own_kind() {
        let err = WebhookError::from(DomainError::HumidityOutOfRange { value: 120.0 });

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), ErrorKind::Domain);
    }

    #[test]
    fn storage_errors_do_not_leak_details() {
        let err = WebhookError::from(CoreError::Database("password=hunter2".into()));

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn deadline_is_a_dependency_failure_with_generic_message() {
        let err = WebhookError::DeadlineExceeded { deadline: Duration::from_millis(50) };

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn missing_config_is_a_server_error() {
        let err = WebhookError::MissingAuthConfig;

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn response_body_is_json_error_object() {
        let response = WebhookError::StaleTimestamp { timestamp_ms: 1 }.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Request too old"}));
    }
}
