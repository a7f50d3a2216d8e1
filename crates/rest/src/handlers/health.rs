//! Health check endpoint handlers.
//!
//! These routes belong to the Health category: they are mounted outside the
//! access gate, need no credentials and never open a scoped session.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bastion_persistence::core::IsolationBackend;
use tracing::{debug, warn};

use crate::error::RestResult;
use crate::state::AppState;

/// Handler for the health check endpoint.
///
/// # HTTP Request
///
/// `GET [base]/health`
///
/// # Response
///
/// - `200 OK` - Server is healthy
pub async fn health_handler<B>(State(state): State<AppState<B>>) -> RestResult<Response>
where
    B: IsolationBackend + 'static,
{
    debug!("Processing health check request");

    let health_response = serde_json::json!({
        "status": "healthy",
        "backend": state.backend_name(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    Ok((StatusCode::OK, Json(health_response)).into_response())
}

/// Handler for the liveness probe.
///
/// # HTTP Request
///
/// `GET [base]/_liveness`
pub async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Handler for the readiness probe.
///
/// Asks the backend for a connection without binding any scope.
///
/// # HTTP Request
///
/// `GET [base]/_readiness`
///
/// # Response
///
/// - `200 OK` - Storage reachable
/// - `503 Service Unavailable` - Storage check failed
pub async fn readiness_handler<B>(State(state): State<AppState<B>>) -> Response
where
    B: IsolationBackend + 'static,
{
    debug!("Processing readiness check request");

    let (status, storage) = match state.store().backend().health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    let response = serde_json::json!({
        "status": if status.is_success() { "ready" } else { "not-ready" },
        "backend": state.backend_name(),
        "checks": {
            "storage": storage
        }
    });

    (status, Json(response)).into_response()
}
