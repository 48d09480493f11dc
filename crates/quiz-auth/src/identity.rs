//! Authenticated identity attached to a request or RPC.
//!
//! An [`AuthContext`] is created per call, either from verified claims at
//! the edge or from trusted propagation metadata internally, and is stored
//! in the request's extensions keyed by its type. Handlers read it through
//! [`IdentityExt`] or, in axum, by taking `AuthContext` as an extractor.

use crate::claims::Claims;
use crate::errors::AuthError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::fmt;
use std::sync::Arc;

/// Identity of the caller of the current request.
#[derive(Clone)]
pub struct AuthContext {
    user_id: String,
    username: String,
    email: String,
    /// Present only when the token was verified in this process.
    claims: Option<Arc<Claims>>,
}

impl AuthContext {
    /// Identity from verified token claims.
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            username: claims.preferred_username.clone(),
            email: claims.email.clone(),
            claims: Some(Arc::new(claims)),
        }
    }

    /// Identity accepted from trusted east-west metadata. Carries no claims.
    pub fn from_propagated(user_id: String, username: String, email: String) -> Self {
        Self {
            user_id,
            username,
            email,
            claims: None,
        }
    }

    /// Subject of the token (identity provider user ID).
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Verified claims, if this identity was verified in this process.
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_deref()
    }

    /// Whether the identity comes from a token verified in this process.
    pub fn is_verified(&self) -> bool {
        self.claims.is_some()
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("user_id", &"[REDACTED]")
            .field("username", &self.username)
            .field("email", &"[REDACTED]")
            .field("verified", &self.is_verified())
            .finish()
    }
}

/// Extension trait for reading the identity attached to a request.
pub trait IdentityExt {
    /// Get the authenticated identity from request extensions.
    ///
    /// Returns `None` if no auth boundary ran, or the method is public.
    fn auth_context(&self) -> Option<&AuthContext>;
}

impl<T> IdentityExt for tonic::Request<T> {
    fn auth_context(&self) -> Option<&AuthContext> {
        self.extensions().get::<AuthContext>()
    }
}

impl<B> IdentityExt for axum::http::Request<B> {
    fn auth_context(&self) -> Option<&AuthContext> {
        self.extensions().get::<AuthContext>()
    }
}

impl IdentityExt for axum::http::Extensions {
    fn auth_context(&self) -> Option<&AuthContext> {
        self.get::<AuthContext>()
    }
}

/// Identity of a gRPC request, or `UNAUTHENTICATED`.
///
/// For handlers of protected methods, where a missing identity means the
/// auth layer was not installed.
pub fn require_identity<T>(request: &tonic::Request<T>) -> Result<&AuthContext, tonic::Status> {
    request.auth_context().ok_or_else(|| {
        tracing::warn!(target: "auth.grpc", "Handler reached without an authenticated identity");
        AuthError::Unauthenticated.to_status()
    })
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}
