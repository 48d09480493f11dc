//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! Unauthenticated so Prometheus can scrape it. Labels are bounded and
//! carry no identities or tokens.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus text format:
/// ```text
/// # TYPE auth_rejections_total counter
/// auth_rejections_total{boundary="http",reason="token_expired"} 3
/// ```
#[tracing::instrument(skip_all, name = "gateway.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
