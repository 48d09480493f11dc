//! Authentication error taxonomy.
//!
//! Variants stay distinct internally so logs and metrics can tell a provider
//! outage from a forged token. Every variant collapses to the same opaque
//! "authentication failed" message at an external boundary: the HTTP body
//! produced by the `IntoResponse` impl and the gRPC status from
//! [`AuthError::to_status`].

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned to callers for every authentication failure.
pub const AUTH_FAILED_MESSAGE: &str = "authentication failed";

/// `WWW-Authenticate` challenge sent with every 401.
pub const WWW_AUTHENTICATE_CHALLENGE: &str = "Bearer error=\"invalid_token\"";

/// Authentication error.
///
/// Maps to:
/// - HTTP: 401 Unauthorized for every variant
/// - gRPC: `INVALID_ARGUMENT` for `MissingAuthHeader`, `UNAUTHENTICATED` otherwise
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingAuthHeader,

    #[error("malformed authorization header")]
    MalformedAuthHeader,

    #[error("malformed token")]
    MalformedToken,

    #[error("unknown signing method")]
    UnknownSigningMethod,

    #[error("token has no key id")]
    MissingKeyId,

    #[error("failed to fetch signing keys: {0}")]
    KeyFetchFailure(String),

    #[error("signing key not found")]
    KeyNotFound,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("token issued in the future")]
    IssuedInFuture,

    #[error("token issuer mismatch")]
    IssuerMismatch,

    #[error("unauthenticated")]
    Unauthenticated,
}

impl AuthError {
    /// Bounded snake_case label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::MalformedAuthHeader => "malformed_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnknownSigningMethod => "unknown_signing_method",
            AuthError::MissingKeyId => "missing_key_id",
            AuthError::KeyFetchFailure(_) => "key_fetch_failure",
            AuthError::KeyNotFound => "key_not_found",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::TokenExpired => "token_expired",
            AuthError::IssuedInFuture => "issued_in_future",
            AuthError::IssuerMismatch => "issuer_mismatch",
            AuthError::Unauthenticated => "unauthenticated",
        }
    }

    /// True when the failure is on the identity provider side, not the
    /// caller's credential. Nothing retries automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::KeyFetchFailure(_))
    }

    /// Opaque gRPC status for this error.
    pub fn to_status(&self) -> tonic::Status {
        match self {
            AuthError::MissingAuthHeader => tonic::Status::invalid_argument(AUTH_FAILED_MESSAGE),
            _ => tonic::Status::unauthenticated(AUTH_FAILED_MESSAGE),
        }
    }

    /// Log the internal cause at a level matching its severity.
    pub(crate) fn log(&self, boundary: &'static str) {
        if self.is_retryable() {
            tracing::warn!(
                target: "auth.errors",
                boundary,
                reason = self.kind(),
                error = %self,
                "Authentication unavailable"
            );
        } else {
            tracing::debug!(
                target: "auth.errors",
                boundary,
                reason = self.kind(),
                "Authentication rejected"
            );
        }
    }
}

impl From<AuthError> for tonic::Status {
    fn from(err: AuthError) -> Self {
        err.to_status()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    error_description: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: "authentication_failed",
            error_description: AUTH_FAILED_MESSAGE,
        };

        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static(WWW_AUTHENTICATE_CHALLENGE),
        );

        response
    }
}
