//! JWT utilities shared across quiz platform services.
//!
//! This module provides the structural, pre-verification side of token
//! handling:
//! - Size limits for DoS prevention
//! - Clock skew constants for `iat` validation
//! - Header inspection (`alg`, `kid`) without verifying the signature
//! - `iat` validation logic
//! - base64url decoding of RSA JWK components
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing here verifies a signature; header values are only hints for
//!   selecting a key from a trusted key set
//! - Error messages are intentionally generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_header, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let header = decode_header(token)?;
//! let kid = header.require_kid()?;
//!
//! // After signature verification, validate iat
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations.
///
/// # Rationale
///
/// - Typical identity provider access tokens are 800-2000 bytes (RS256
///   signature plus role claims)
/// - 8KB leaves room for large role sets while preventing abuse
/// - Checked BEFORE base64 decode and signature verification
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Upper bound for configuration so a typo cannot disable `iat` checks.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT before verification.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token is missing required `kid` header.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Header Types
// =============================================================================

/// The subset of the JOSE header needed to select a verification key.
///
/// Values are untrusted until the signature has been verified with a key
/// from a trusted key set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm name as written by the issuer (e.g. `RS256`).
    pub alg: String,

    /// Key ID naming the signing key.
    #[serde(default)]
    pub kid: Option<String>,

    /// Token type (usually `JWT`).
    #[serde(default)]
    pub typ: Option<String>,
}

impl TokenHeader {
    /// Return the key ID, rejecting absent and empty values.
    ///
    /// # Errors
    ///
    /// Returns `JwtValidationError::MissingKid` if the header has no usable `kid`.
    pub fn require_kid(&self) -> Result<&str, JwtValidationError> {
        self.kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(JwtValidationError::MissingKid)
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Decode the JWT header without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - `kid` must only be used for key lookup in a trusted JWKS
///
/// # Errors
///
/// Returns `JwtValidationError` variants:
/// - `TokenTooLarge` - Token exceeds size limit
/// - `MalformedToken` - Wrong structure, bad base64, invalid JSON, or no `alg`
pub fn decode_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(_payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice::<TokenHeader>(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` too far in the future, which could indicate
/// token pre-generation, clock synchronization issues, or manipulation.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
///
/// Prefer [`validate_iat`] in production code. This variant exists so that
/// boundary conditions can be unit-tested without wall-clock dependence.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds) by config
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode an RSA JWK component (`n` or `e`) from base64url.
///
/// Identity providers publish these unpadded; trailing `=` padding is
/// tolerated.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the content is not valid base64url.
pub fn decode_rsa_component(b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(b64url.trim_end_matches('='))
}

// =============================================================================
// Tests
// =============================================================================
