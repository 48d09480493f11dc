//! HTTP routes for the edge gateway.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use quiz_auth::middleware::{require_auth, AuthState};
use quiz_auth::{PublicPaths, TokenValidator};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Token validator shared by the edge middleware and the readiness probe.
    pub validator: Arc<TokenValidator>,
}

impl AppState {
    /// Build state with a validator for the configured realm.
    pub fn new(config: Config) -> Self {
        let validator = Arc::new(TokenValidator::from_config(&config.auth));
        Self { config, validator }
    }
}

/// Paths the edge serves without a bearer token.
pub fn public_paths() -> PublicPaths {
    PublicPaths::quiz_platform().with_prefix("/ready")
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public
/// - `/ready` - Readiness probe (checks JWKS availability) - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/me` - Current user endpoint - requires authentication
/// - Edge authentication: identity header stripping on every route
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState::new(state.validator.clone(), public_paths()));

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new().route("/api/v1/me", get(handlers::get_me));

    // Layer order (bottom-to-top execution):
    // 1. require_auth - Strip identity headers, verify tokens (innermost)
    // 2. TraceLayer - Log request details
    // 3. TimeoutLayer - Timeout the request
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(auth_state, require_auth))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
