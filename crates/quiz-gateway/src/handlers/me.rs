//! Current user handler.
//!
//! Returns the identity of the caller from the verified token.

use axum::Json;
use chrono::{DateTime, Utc};
use quiz_auth::{AuthContext, AuthError};
use serde::Serialize;
use tracing::instrument;

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Subject (identity provider user ID).
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
    pub realm_roles: Vec<String>,
    pub scopes: Vec<String>,

    /// Token expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Handler for GET /api/v1/me
///
/// Requires the auth middleware. The identity must come from a token
/// verified in this process; a propagated identity is rejected.
///
/// ```json
/// {
///   "user_id": "0b6f5a2e-4c1d-4e8a-9f3b-1a2b3c4d5e01",
///   "username": "alice",
///   "email": "alice@example.com",
///   "email_verified": true,
///   "realm_roles": ["player"],
///   "scopes": ["openid", "profile", "email"],
///   "expires_at": "2026-01-01T12:00:00Z"
/// }
/// ```
#[instrument(skip_all, name = "gateway.handlers.me")]
pub async fn get_me(ctx: AuthContext) -> Result<Json<MeResponse>, AuthError> {
    let claims = ctx.claims().ok_or_else(|| {
        tracing::warn!(target: "gateway.handlers.me", "Identity without verified claims");
        AuthError::Unauthenticated
    })?;

    Ok(Json(MeResponse {
        user_id: ctx.user_id().to_string(),
        username: ctx.username().to_string(),
        email: ctx.email().to_string(),
        email_verified: claims.email_verified,
        realm_roles: claims.realm_roles().to_vec(),
        scopes: claims.scopes().into_iter().map(str::to_string).collect(),
        expires_at: DateTime::from_timestamp(claims.exp, 0),
    }))
}
