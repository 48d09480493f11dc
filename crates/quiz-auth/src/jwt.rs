//! Access token validation.
//!
//! Validates bearer tokens issued by the realm, using public keys from the
//! [`KeyCache`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RSA-family algorithms are accepted; `none`, HMAC and everything
//!   else is rejected before any key lookup (algorithm confusion)
//! - A key published for one algorithm is never used with another
//! - `exp` is checked without leeway; `iat` with the configured clock skew
//! - `iss` must equal `{base_url}/realms/{realm}` exactly
//! - Callers only ever see a generic message; the cause goes to logs/metrics

use crate::claims::Claims;
use crate::config::AuthConfig;
use crate::errors::AuthError;
use crate::jwks::{rsa_algorithm, KeyCache, SigningKey};
use crate::observability::metrics;
use common::jwt::{decode_header, validate_iat};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Token validator using the realm's JWKS.
pub struct TokenValidator {
    /// Signing key source.
    key_cache: Arc<KeyCache>,

    /// Exact expected `iss` value.
    issuer: String,

    /// Tolerance for `iat` in the future.
    clock_skew: Duration,
}

impl TokenValidator {
    /// Create a new token validator.
    ///
    /// # Arguments
    ///
    /// * `key_cache` - Source of signing keys
    /// * `issuer` - Expected `iss` claim
    /// * `clock_skew` - Tolerance for `iat` in the future
    pub fn new(key_cache: Arc<KeyCache>, issuer: String, clock_skew: Duration) -> Self {
        Self {
            key_cache,
            issuer,
            clock_skew,
        }
    }

    /// Create a validator and its key cache from the auth configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            Arc::new(KeyCache::from_config(config)),
            config.issuer(),
            config.clock_skew,
        )
    }

    pub fn key_cache(&self) -> &Arc<KeyCache> {
        &self.key_cache
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Validate a token and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size and structure check before any decoding
    /// 2. RSA-family `alg` required
    /// 3. `kid` required, key fetched from the cache
    /// 4. Signature verified
    /// 5. `exp` validated (no leeway)
    /// 6. `iss` validated
    /// 7. `iat` validated with clock skew tolerance
    ///
    /// # Errors
    ///
    /// Returns the specific [`AuthError`]; boundaries collapse it to a
    /// generic message.
    #[instrument(skip_all, name = "auth.jwt.validate")]
    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let result = self.validate_inner(token).await;

        match &result {
            Ok(_) => {
                tracing::debug!(target: "auth.jwt", "Token validated successfully");
                metrics::record_token_validation("success");
            }
            Err(e) => {
                tracing::debug!(target: "auth.jwt", reason = e.kind(), "Token validation failed");
                metrics::record_token_validation(e.kind());
            }
        }

        result
    }

    async fn validate_inner(&self, token: &str) -> Result<Claims, AuthError> {
        // 1. Parse the header (includes size check via common::jwt)
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "auth.jwt", error = ?e, "Token header parsing failed");
            AuthError::MalformedToken
        })?;

        // 2. Only RSA-family algorithms
        let algorithm = rsa_algorithm(&header.alg).ok_or_else(|| {
            tracing::debug!(target: "auth.jwt", alg = %header.alg, "Rejected signing algorithm");
            AuthError::UnknownSigningMethod
        })?;

        // 3. Key ID
        let kid = header.require_kid().map_err(|_| AuthError::MissingKeyId)?;

        // 4. Signing key
        let key = self.key_cache.get_key(kid).await?;

        // 5. Signature, exp, iss
        let claims = verify_token(token, &key, algorithm, &self.issuer)?;

        // 6. iat with clock skew tolerance using common utility
        validate_iat(claims.iat, self.clock_skew).map_err(|e| {
            tracing::debug!(target: "auth.jwt", error = ?e, "Token iat validation failed");
            AuthError::IssuedInFuture
        })?;

        Ok(claims)
    }
}

/// Verify the signature with `key` and validate `exp` and `iss`.
fn verify_token(
    token: &str,
    key: &SigningKey,
    algorithm: Algorithm,
    issuer: &str,
) -> Result<Claims, AuthError> {
    if let Some(key_algorithm) = key.algorithm() {
        if key_algorithm != algorithm {
            tracing::debug!(
                target: "auth.jwt",
                kid = %key.kid(),
                key_alg = ?key_algorithm,
                token_alg = ?algorithm,
                "Token algorithm does not match key algorithm"
            );
            return Err(AuthError::SignatureInvalid);
        }
    }

    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.validate_exp = true;
    // Access tokens carry the client as `azp`; `aud` is not checked
    validation.validate_aud = false;
    validation.set_issuer(&[issuer]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let token_data = decode::<Claims>(token, key.decoding_key(), &validation).map_err(|e| {
        tracing::debug!(target: "auth.jwt", error = %e, "Token verification failed");
        match e.kind() {
            ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
            ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => AuthError::IssuerMismatch,
            ErrorKind::InvalidAlgorithm => AuthError::UnknownSigningMethod,
            _ => AuthError::MalformedToken,
        }
    })?;

    Ok(token_data.claims)
}
