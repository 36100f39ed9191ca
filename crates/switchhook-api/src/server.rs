//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Panic capture
//! 4. Body size limit
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! On SIGINT or SIGTERM the server stops accepting connections and waits
//! for in-flight requests to finish.

use std::{
    any::Any,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use switchhook_core::Clock;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{error::WebhookError, handlers, pipeline::WebhookProcessor};

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Webhook pipeline
    pub processor: WebhookProcessor,
    /// Clock for health timestamps
    pub clock: Arc<dyn Clock>,
    /// Largest accepted request body in bytes
    pub max_payload_bytes: usize,
    /// Peers whose `X-Forwarded-For` header is honoured; empty means the
    /// socket peer is always the caller
    pub trusted_proxies: Arc<[IpAddr]>,
}

impl AppState {
    /// Creates state with default limits.
    pub fn new(processor: WebhookProcessor, clock: Arc<dyn Clock>) -> Self {
        Self {
            processor,
            clock,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            trusted_proxies: Arc::from(Vec::new()),
        }
    }
}

/// Creates the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use switchhook_api::{
///     auth::{AuthPolicy, Authenticator, StaticAuthConfigSource},
///     pipeline::WebhookProcessor,
///     server::{create_router, AppState},
/// };
/// use switchhook_core::{EnvironmentRepository, RealClock};
///
/// fn build(repository: Arc<dyn EnvironmentRepository>) -> axum::Router {
///     let clock = Arc::new(RealClock::new());
///     let processor = WebhookProcessor::new(
///         Authenticator::new(AuthPolicy::default(), clock.clone()),
///         Arc::new(StaticAuthConfigSource::new(None)),
///         repository,
///     );
///     create_router(AppState::new(processor, clock))
/// }
/// ```
pub fn create_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health/live", get(handlers::liveness_check))
        .route("/health/ready", get(handlers::readiness_check));

    let webhook_routes = Router::new().route("/webhook/{provider}", any(handlers::receive_webhook));

    let body_limit = state.max_payload_bytes;

    Router::new()
        .merge(health_routes)
        .merge(webhook_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Converts a panic inside a handler into the generic 500 body.
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| (*s).to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());

    error!(panic = %detail, "Request handler panicked");
    WebhookError::Internal(detail).into_response()
}

/// Starts the HTTP server with graceful shutdown support.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let app = create_router(state);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for CTRL+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight requests to complete");
}
