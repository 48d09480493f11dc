//! Authentication middleware for the HTTP edge.
//!
//! Strips spoofable identity headers, lets public paths through, and for
//! every other request validates the bearer token and injects an
//! [`AuthContext`] into request extensions.

use crate::errors::AuthError;
use crate::identity::AuthContext;
use crate::jwt::TokenValidator;
use crate::observability::metrics;
use crate::policy::PublicPaths;
use crate::propagation;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token validator with key cache.
    pub validator: Arc<TokenValidator>,

    /// Paths served without authentication.
    pub public_paths: Arc<PublicPaths>,
}

impl AuthState {
    pub fn new(validator: Arc<TokenValidator>, public_paths: PublicPaths) -> Self {
        Self {
            validator,
            public_paths: Arc::new(public_paths),
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// # Errors
///
/// - `MissingAuthHeader` if there is no `Authorization` header
/// - `MalformedAuthHeader` if it is not UTF-8, not `Bearer`, or the token is empty
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?;

    let value = value.to_str().map_err(|_| AuthError::MalformedAuthHeader)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MalformedAuthHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MalformedAuthHeader);
    }

    Ok(token)
}

/// Authentication middleware that validates bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - Public paths continue without authentication
/// - Returns 401 Unauthorized with `WWW-Authenticate` if the token is missing or invalid
/// - Continues to next handler with `AuthContext` in extensions if the token is valid
#[instrument(skip_all, name = "auth.middleware.require_auth", fields(path = %req.uri().path()))]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    // Identity headers only ever come from this middleware
    propagation::strip_headers(req.headers_mut());

    if state.public_paths.is_public(req.uri().path()) {
        tracing::trace!(target: "auth.middleware", "Public path, skipping authentication");
        return Ok(next.run(req).await);
    }

    let ctx = authenticate(&state, req.headers()).await.map_err(|e| {
        e.log(metrics::BOUNDARY_HTTP);
        metrics::record_rejection(metrics::BOUNDARY_HTTP, e.kind());
        e
    })?;

    // Forward the verified identity, never the caller's copy
    if let Err(e) = propagation::inject_headers(&ctx, req.headers_mut()) {
        tracing::debug!(target: "auth.middleware", error = %e, "Identity not forwarded as headers");
    }

    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

async fn authenticate(state: &AuthState, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
    let token = extract_bearer_token(headers)?;
    let claims = state.validator.validate(token).await?;
    Ok(AuthContext::from_claims(claims))
}
