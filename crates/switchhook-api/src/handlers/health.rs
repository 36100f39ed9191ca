//! Liveness and readiness endpoints.
//!
//! Liveness only proves the process answers HTTP. Readiness asks the
//! repository whether storage is reachable.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use switchhook_core::{Clock, EnvironmentRepository};
use tracing::{error, instrument};

use crate::server::AppState;

/// Readiness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    /// Storage answered
    Healthy,
    /// Storage did not answer
    Unhealthy,
}

/// Body of `GET /health/ready`.
#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    /// Overall verdict
    pub status: Readiness,
    /// When the check ran
    pub timestamp: DateTime<Utc>,
    /// `up` or `down`
    pub storage: &'static str,
}

impl ReadinessReport {
    /// Runs the storage check against `repository`.
    pub async fn check(clock: &dyn Clock, repository: &dyn EnvironmentRepository) -> Self {
        let timestamp = DateTime::<Utc>::from(clock.now_system());

        match repository.health_check().await {
            Ok(()) => Self { status: Readiness::Healthy, timestamp, storage: "up" },
            Err(e) => {
                error!(error = %e, "Storage unreachable");
                Self { status: Readiness::Unhealthy, timestamp, storage: "down" }
            },
        }
    }

    /// 200 when healthy, 503 otherwise.
    pub const fn status_code(&self) -> StatusCode {
        match self.status {
            Readiness::Healthy => StatusCode::OK,
            Readiness::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// `GET /health/ready`
#[instrument(name = "readiness_check", skip_all)]
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let repository = state.processor.repository();
    let report = ReadinessReport::check(state.clock.as_ref(), repository.as_ref()).await;

    (report.status_code(), Json(report))
}

/// `GET /health/live`
pub async fn liveness_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "alive",
        "timestamp": DateTime::<Utc>::from(state.clock.now_system()),
        "service": "switchhook"
    }))
}
