//! Identity propagation across internal hops.
//!
//! The edge verifies a token once and forwards the identity to internal
//! services as plain metadata (`user_id`, `username`, `email`) instead of
//! the raw token. Internal services running in trusting mode read it back
//! with [`extract`].
//!
//! # Security
//!
//! The metadata is unsigned. It is only trustworthy on a network path the
//! edge controls exclusively, and the edge strips any inbound copies
//! ([`strip_headers`]) before forwarding.

use crate::identity::AuthContext;
use axum::http::{HeaderMap, HeaderValue};
use thiserror::Error;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::service::Interceptor;
use tonic::Status;

/// Metadata key carrying the user ID.
pub const USER_ID_KEY: &str = "user_id";

/// Metadata key carrying the username.
pub const USERNAME_KEY: &str = "username";

/// Metadata key carrying the e-mail address.
pub const EMAIL_KEY: &str = "email";

/// All identity keys, in injection order.
pub const IDENTITY_KEYS: [&str; 3] = [USER_ID_KEY, USERNAME_KEY, EMAIL_KEY];

/// Errors encoding or decoding propagated identity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PropagationError {
    #[error("identity field '{0}' is empty")]
    EmptyField(&'static str),

    #[error("identity field '{0}' is not a valid metadata value")]
    InvalidValue(&'static str),
}

/// Validated identity values, ready to write.
struct EncodedIdentity<V> {
    user_id: V,
    username: V,
    email: V,
}

/// Whether `value` reads back through `to_str()` on the receiving side.
///
/// Header parsers also accept obs-text (0x80 and above), which `extract`
/// cannot decode, so only visible ASCII, space and tab are allowed.
fn is_visible_ascii(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b == b'\t' || (0x20..0x7f).contains(&b))
}

fn encode<V, E>(
    ctx: &AuthContext,
    convert: impl Fn(&str) -> Result<V, E>,
) -> Result<EncodedIdentity<V>, PropagationError> {
    if ctx.user_id().is_empty() {
        return Err(PropagationError::EmptyField(USER_ID_KEY));
    }

    let field = |key: &'static str, value: &str| {
        if !is_visible_ascii(value) {
            return Err(PropagationError::InvalidValue(key));
        }
        convert(value).map_err(|_| PropagationError::InvalidValue(key))
    };

    Ok(EncodedIdentity {
        user_id: field(USER_ID_KEY, ctx.user_id())?,
        username: field(USERNAME_KEY, ctx.username())?,
        email: field(EMAIL_KEY, ctx.email())?,
    })
}

/// Write `ctx` into gRPC metadata, replacing any existing identity values.
///
/// Nothing is written unless every field encodes.
///
/// # Errors
///
/// Returns `PropagationError` if the user ID is empty or a field is not
/// valid ASCII metadata.
pub fn inject(ctx: &AuthContext, metadata: &mut MetadataMap) -> Result<(), PropagationError> {
    let encoded = encode(ctx, |value| value.parse::<AsciiMetadataValue>())?;

    metadata.insert(USER_ID_KEY, encoded.user_id);
    metadata.insert(USERNAME_KEY, encoded.username);
    metadata.insert(EMAIL_KEY, encoded.email);

    tracing::trace!(target: "auth.propagation", "Identity injected into metadata");
    Ok(())
}

/// Write `ctx` into HTTP headers, for hops that forward headers as metadata.
///
/// # Errors
///
/// Same as [`inject`].
pub fn inject_headers(ctx: &AuthContext, headers: &mut HeaderMap) -> Result<(), PropagationError> {
    let encoded = encode(ctx, HeaderValue::from_str)?;

    headers.insert(USER_ID_KEY, encoded.user_id);
    headers.insert(USERNAME_KEY, encoded.username);
    headers.insert(EMAIL_KEY, encoded.email);
    Ok(())
}

/// Read a propagated identity.
///
/// Returns `Ok(None)` when no `user_id` is present. `username` and `email`
/// default to empty.
///
/// # Errors
///
/// Returns `PropagationError` if `user_id` is empty or any field is not
/// valid ASCII.
pub fn extract(metadata: &MetadataMap) -> Result<Option<AuthContext>, PropagationError> {
    let Some(user_id) = metadata.get(USER_ID_KEY) else {
        return Ok(None);
    };

    let user_id = user_id
        .to_str()
        .map_err(|_| PropagationError::InvalidValue(USER_ID_KEY))?;
    if user_id.trim().is_empty() {
        return Err(PropagationError::EmptyField(USER_ID_KEY));
    }

    let optional = |key: &'static str| -> Result<String, PropagationError> {
        metadata
            .get(key)
            .map(|value| value.to_str().map_err(|_| PropagationError::InvalidValue(key)))
            .transpose()
            .map(|value| value.unwrap_or_default().to_string())
    };

    Ok(Some(AuthContext::from_propagated(
        user_id.to_string(),
        optional(USERNAME_KEY)?,
        optional(EMAIL_KEY)?,
    )))
}

/// Remove all identity keys from gRPC metadata.
pub fn strip(metadata: &mut MetadataMap) {
    for key in IDENTITY_KEYS {
        metadata.remove(key);
    }
}

/// Remove all identity headers. Used at the edge on every inbound request.
pub fn strip_headers(headers: &mut HeaderMap) {
    for key in IDENTITY_KEYS {
        headers.remove(key);
    }
}

/// Client interceptor that forwards an identity on internal calls.
///
/// Replaces any identity metadata already on the request and removes the
/// `authorization` entry, so raw tokens do not travel east-west.
///
/// ```rust,ignore
/// let client = QuizServiceClient::with_interceptor(
///     channel,
///     IdentityPropagator::new(ctx.clone()),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct IdentityPropagator {
    context: AuthContext,
}

impl IdentityPropagator {
    pub fn new(context: AuthContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AuthContext {
        &self.context
    }
}

impl Interceptor for IdentityPropagator {
    fn call(&mut self, mut request: tonic::Request<()>) -> Result<tonic::Request<()>, Status> {
        let metadata = request.metadata_mut();
        metadata.remove("authorization");
        strip(metadata);

        inject(&self.context, metadata).map_err(|e| {
            tracing::warn!(target: "auth.propagation", error = %e, "Failed to propagate identity");
            Status::internal("identity propagation failed")
        })?;

        Ok(request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn ctx(user_id: &str, username: &str, email: &str) -> AuthContext {
        AuthContext::from_propagated(user_id.to_string(), username.to_string(), email.to_string())
    }

    #[test]
    fn test_inject_then_extract() {
        let mut metadata = MetadataMap::new();
        inject(&ctx("user-1", "alice", "alice@example.com"), &mut metadata).unwrap();

        assert_eq!(metadata.get(USER_ID_KEY).unwrap(), "user-1");

        let extracted = extract(&metadata).unwrap().unwrap();
        assert_eq!(extracted.user_id(), "user-1");
        assert_eq!(extracted.username(), "alice");
        assert_eq!(extracted.email(), "alice@example.com");
        assert!(!extracted.is_verified());
    }

    #[test]
    fn test_inject_replaces_existing_values() {
        let mut metadata = MetadataMap::new();
        metadata.insert(USER_ID_KEY, "spoofed".parse().unwrap());
        metadata.append(USER_ID_KEY, "spoofed-too".parse().unwrap());

        inject(&ctx("user-1", "", ""), &mut metadata).unwrap();

        assert_eq!(metadata.get_all(USER_ID_KEY).iter().count(), 1);
        assert_eq!(metadata.get(USER_ID_KEY).unwrap(), "user-1");
    }

    #[test]
    fn test_inject_rejects_empty_user_id() {
        let mut metadata = MetadataMap::new();
        assert_eq!(
            inject(&ctx("", "alice", ""), &mut metadata),
            Err(PropagationError::EmptyField(USER_ID_KEY))
        );
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_inject_rejects_non_ascii_without_partial_write() {
        let mut metadata = MetadataMap::new();
        assert_eq!(
            inject(&ctx("user-1", "zoë", ""), &mut metadata),
            Err(PropagationError::InvalidValue(USERNAME_KEY))
        );
        assert!(metadata.get(USER_ID_KEY).is_none());
    }

    #[test]
    fn test_extract_absent_is_none() {
        assert!(extract(&MetadataMap::new()).unwrap().is_none());

        // Username alone does not make an identity
        let mut metadata = MetadataMap::new();
        metadata.insert(USERNAME_KEY, "alice".parse().unwrap());
        assert!(extract(&metadata).unwrap().is_none());
    }

    #[test]
    fn test_extract_empty_user_id() {
        let mut metadata = MetadataMap::new();
        metadata.insert(USER_ID_KEY, "".parse().unwrap());
        assert_eq!(
            extract(&metadata).err(),
            Some(PropagationError::EmptyField(USER_ID_KEY))
        );
    }

    #[test]
    fn test_extract_defaults_optional_fields() {
        let mut metadata = MetadataMap::new();
        metadata.insert(USER_ID_KEY, "user-1".parse().unwrap());

        let extracted = extract(&metadata).unwrap().unwrap();
        assert_eq!(extracted.username(), "");
        assert_eq!(extracted.email(), "");
    }

    #[test]
    fn test_extract_non_ascii_value() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_KEY, HeaderValue::from_static("user-1"));
        headers.insert(EMAIL_KEY, HeaderValue::from_bytes(b"\xfa@example.com").unwrap());
        let metadata = MetadataMap::from_headers(headers);

        assert_eq!(
            extract(&metadata).err(),
            Some(PropagationError::InvalidValue(EMAIL_KEY))
        );
    }

    #[test]
    fn test_strip_removes_all_identity_keys() {
        let mut metadata = MetadataMap::new();
        inject(&ctx("user-1", "alice", "a@b.c"), &mut metadata).unwrap();
        metadata.insert("x-request-id", "abc".parse().unwrap());

        strip(&mut metadata);

        for key in IDENTITY_KEYS {
            assert!(metadata.get(key).is_none());
        }
        assert!(metadata.get("x-request-id").is_some());
    }

    #[test]
    fn test_strip_headers_and_inject_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_KEY, HeaderValue::from_static("admin"));
        headers.append(USER_ID_KEY, HeaderValue::from_static("root"));
        headers.insert(EMAIL_KEY, HeaderValue::from_static("x@y.z"));

        strip_headers(&mut headers);
        assert!(headers.is_empty());

        inject_headers(&ctx("user-1", "alice", ""), &mut headers).unwrap();
        assert_eq!(headers.get(USER_ID_KEY).unwrap(), "user-1");
        assert_eq!(headers.get(USERNAME_KEY).unwrap(), "alice");
    }

    #[test]
    fn test_identity_propagator_interceptor() {
        let mut propagator = IdentityPropagator::new(ctx("user-1", "alice", "a@b.c"));

        let mut request = tonic::Request::new(());
        request
            .metadata_mut()
            .insert("authorization", "Bearer raw-token".parse().unwrap());
        request
            .metadata_mut()
            .insert(USER_ID_KEY, "spoofed".parse().unwrap());

        let request = propagator.call(request).unwrap();
        let metadata = request.metadata();

        assert!(metadata.get("authorization").is_none());
        assert_eq!(metadata.get(USER_ID_KEY).unwrap(), "user-1");
        assert_eq!(metadata.get(USERNAME_KEY).unwrap(), "alice");
    }

    #[test]
    fn test_inject_headers_rejects_non_ascii() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            inject_headers(&ctx("user-1", "alice", "zoë@example.com"), &mut headers),
            Err(PropagationError::InvalidValue(EMAIL_KEY))
        );
        assert!(headers.is_empty());
    }

    #[test]
    fn test_injected_identity_always_extracts() {
        let printable: String = (0x20u8..0x7f).map(char::from).collect();
        let accepted = [
            ctx("user-1", "alice", "alice@example.com"),
            ctx("user-1", &printable, "tab\there"),
        ];
        for identity in accepted {
            let mut metadata = MetadataMap::new();
            inject(&identity, &mut metadata).unwrap();

            let extracted = extract(&metadata).unwrap().unwrap();
            assert_eq!(extracted.username(), identity.username());
            assert_eq!(extracted.email(), identity.email());
        }

        // Values the receiving side could not decode are refused up front
        for (username, email) in [("zoë", ""), ("", "\u{7f}@example.com"), ("名前", "")] {
            let mut metadata = MetadataMap::new();
            assert!(inject(&ctx("user-1", username, email), &mut metadata).is_err());
            assert!(metadata.is_empty());
        }
    }

    #[test]
    fn test_identity_propagator_refuses_non_ascii_identity() {
        let mut propagator = IdentityPropagator::new(ctx("user-1", "zoë", ""));
        let status = propagator.call(tonic::Request::new(())).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);
    }

    #[test]
    fn test_identity_propagator_invalid_identity() {
        let mut propagator = IdentityPropagator::new(ctx("", "alice", ""));
        let status = propagator.call(tonic::Request::new(())).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);
    }
}
