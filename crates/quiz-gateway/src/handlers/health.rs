//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns healthy if the process is running
//! - `/ready`: Readiness probe - checks that signing keys are available

use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Liveness response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Identity provider JWKS availability.
    pub jwks: &'static str,

    /// Error message (generic, no infrastructure details).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Liveness probe handler.
///
/// Does NOT check any dependencies.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Readiness probe handler.
///
/// Ready once the key cache holds at least one signing key. A cold cache
/// is warmed here, so a gateway that cannot reach the identity provider
/// stays out of the load balancer. Returns 200 if ready, 503 if not.
#[tracing::instrument(skip_all, name = "gateway.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let key_cache = state.validator.key_cache();

    let available = if key_cache.key_count().await > 0 {
        true
    } else {
        match key_cache.force_refresh().await {
            Ok(count) => count > 0,
            Err(e) => {
                tracing::warn!(target: "gateway.health", error = %e, "Readiness check failed: JWKS unavailable");
                false
            }
        }
    };

    if available {
        (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                jwks: "available",
                error: None,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                jwks: "unavailable",
                error: Some("Service dependencies unavailable"),
            }),
        )
    }
}
