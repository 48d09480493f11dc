//! Auth core metrics.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `result`: `success` or an `AuthError::kind()` value (12 max)
//! - `boundary`: `http`, `grpc`, `grpc_stream`
//! - `reason`: an `AuthError::kind()` value
//! - `status` (JWKS fetch): `success`, `http_error`, `network_error`, `invalid_response`
//! - `result` (cache lookup): `hit`, `miss`, `refresh`

use metrics::{counter, histogram};
use std::time::Duration;

/// Edge HTTP middleware.
pub const BOUNDARY_HTTP: &str = "http";
/// gRPC tower layer; covers unary and streaming calls alike.
pub const BOUNDARY_GRPC: &str = "grpc";
/// Per-handler stream interceptor.
pub const BOUNDARY_GRPC_STREAM: &str = "grpc_stream";

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record the outcome of one token validation.
///
/// Metric: `auth_token_validations_total`
/// Labels: `result`
pub fn record_token_validation(result: &'static str) {
    counter!("auth_token_validations_total", "result" => result).increment(1);
}

/// Record a request rejected at an authentication boundary.
///
/// Metric: `auth_rejections_total`
/// Labels: `boundary`, `reason`
pub fn record_rejection(boundary: &'static str, reason: &'static str) {
    counter!("auth_rejections_total",
        "boundary" => boundary,
        "reason" => reason
    )
    .increment(1);
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a JWKS fetch against the identity provider.
///
/// Metric: `auth_jwks_fetches_total`, `auth_jwks_fetch_duration_seconds`
/// Labels: `status`
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("auth_jwks_fetch_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());

    counter!("auth_jwks_fetches_total", "status" => status).increment(1);
}

/// Record a key cache lookup.
///
/// Metric: `auth_jwks_cache_lookups_total`
/// Labels: `result`
pub fn record_jwks_cache_lookup(result: &'static str) {
    counter!("auth_jwks_cache_lookups_total", "result" => result).increment(1);
}
