//! Authenticators for the gRPC boundary.

use crate::errors::AuthError;
use crate::identity::AuthContext;
use crate::jwt::TokenValidator;
use crate::observability::metrics;
use crate::policy::MethodPolicy;
use crate::propagation;
use async_trait::async_trait;
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tonic::Status;

/// How a service establishes the caller's identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Policy deciding which methods need authentication.
    fn policy(&self) -> &MethodPolicy;

    /// Short name for logs (`verifying` or `trusting`).
    fn mode(&self) -> &'static str;

    /// Establish the caller's identity from request metadata.
    async fn authenticate(&self, metadata: &MetadataMap) -> Result<AuthContext, AuthError>;
}

/// Shared authorization routine for unary and streaming calls.
///
/// Returns `Ok(None)` for exempt methods, `Ok(Some(ctx))` for authenticated
/// calls, and an opaque status otherwise.
pub async fn authorize_call(
    authenticator: &dyn Authenticator,
    method: &str,
    metadata: &MetadataMap,
    boundary: &'static str,
) -> Result<Option<AuthContext>, Status> {
    if !authenticator.policy().requires_auth(method) {
        tracing::trace!(target: "auth.grpc", method = %method, "Public method, skipping authentication");
        return Ok(None);
    }

    match authenticator.authenticate(metadata).await {
        Ok(ctx) => {
            tracing::debug!(
                target: "auth.grpc",
                method = %method,
                mode = authenticator.mode(),
                "Call authenticated"
            );
            Ok(Some(ctx))
        }
        Err(e) => {
            e.log(boundary);
            metrics::record_rejection(boundary, e.kind());
            Err(e.to_status())
        }
    }
}

/// Extract the token from `authorization: Bearer <token>` metadata.
fn extract_bearer_metadata(metadata: &MetadataMap) -> Result<&str, AuthError> {
    let value = metadata
        .get("authorization")
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

/// Edge authenticator: validates the bearer token cryptographically.
///
/// Any propagated identity metadata on the request is ignored.
#[derive(Clone)]
pub struct VerifyingAuthenticator {
    validator: Arc<TokenValidator>,
    policy: Arc<MethodPolicy>,
}

impl VerifyingAuthenticator {
    pub fn new(validator: Arc<TokenValidator>, policy: Arc<MethodPolicy>) -> Self {
        Self { validator, policy }
    }
}

#[async_trait]
impl Authenticator for VerifyingAuthenticator {
    fn policy(&self) -> &MethodPolicy {
        &self.policy
    }

    fn mode(&self) -> &'static str {
        "verifying"
    }

    async fn authenticate(&self, metadata: &MetadataMap) -> Result<AuthContext, AuthError> {
        let token = extract_bearer_metadata(metadata)?;
        let claims = self.validator.validate(token).await?;
        Ok(AuthContext::from_claims(claims))
    }
}

/// Internal authenticator: accepts identity propagated by the edge.
///
/// Performs no signature verification. Only sound on a network path that
/// external callers cannot reach directly.
#[derive(Clone)]
pub struct TrustingAuthenticator {
    policy: Arc<MethodPolicy>,
}

impl TrustingAuthenticator {
    pub fn new(policy: Arc<MethodPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Authenticator for TrustingAuthenticator {
    fn policy(&self) -> &MethodPolicy {
        &self.policy
    }

    fn mode(&self) -> &'static str {
        "trusting"
    }

    async fn authenticate(&self, metadata: &MetadataMap) -> Result<AuthContext, AuthError> {
        match propagation::extract(metadata) {
            Ok(Some(ctx)) => Ok(ctx),
            Ok(None) => Err(AuthError::MissingAuthHeader),
            Err(e) => {
                tracing::debug!(target: "auth.grpc", error = %e, "Invalid propagated identity");
                Err(AuthError::MalformedAuthHeader)
            }
        }
    }
}
