//! Deterministic cryptographic fixtures for testing
//!
//! Provides two fixed 2048-bit RSA keypairs with their public JWK
//! components, plus helpers for producing deliberately bad tokens
//! (`alg: none`, HMAC-signed, tampered).
//!
//! The private keys are checked into `fixtures/` and MUST NOT be used
//! anywhere but tests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use thiserror::Error;

const PRIMARY_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/primary_rsa_key.pem");
const PRIMARY_MODULUS: &str = "syZN9vyOxTVEWJDMuyGx2-QaKHfaEEpceq5c5-cT0uL9gbZr3k1GIZGBYMz1je0v6cuuvgqn-hyyXVMXFErned32b2ahmBCSYEzi9YdmN_llgqwipLZ-fPvLrCptb-PMI903D3rfv4P-PosjbWLOQw7b6Kc03zPSENNBaJQVNPvdUBl6cqAG162gM2xrzH83mZ4iIzVEDH0XiaHkBtzGxEaSCKCApX0LwA2VG6VMTJa_21Sf9LlRoLgX3XNkJtrwd17ui2dAJKmYOr0jkufDwCZfTkrx18Lo1Vc5QwEAYO91RVDTBYc4G3vtqHNBxxgPY4zTH4hf5O4y6endF8nGRw";

const SECONDARY_PRIVATE_KEY_PEM: &str = include_str!("../fixtures/secondary_rsa_key.pem");
const SECONDARY_MODULUS: &str = "zB_ggHCQ_6dSEILsGNREA_R59CDFDIjDHA1FQttgaYw7Lg47XCz1SXce3zf8xNPMqO4mybjhHbd-B0NVgPAWBNx6_7nNHgMic_SU8QaDbYmK0dYqLGsFITr-HR22DQg5C5rDKuLVEFpAzO8L7fcQYXPa9QhbRAl0e09I3FS6GIculcdID0mSpMmj0_J0PzT1yRpSd96YCiJO4cK7MnA85duGxDHN3OKx1ZQanSngpCqDpzJMUzxHhj0-fxEmhwQeWIU6kztP9FawDegOW2MAjXY8uhEPK5NSzMOUsVdO9TIhxjiUZWy6QbjI4mneWcR0l7HpxkCmdUVt5RPQ5zWLvQ";

/// Public exponent 65537, shared by both fixtures.
pub const TEST_RSA_EXPONENT: &str = "AQAB";

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Invalid fixture key: {0}")]
    Key(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// An RSA keypair published under a key ID.
///
/// # Example
/// ```rust,ignore
/// let key = TestKeypair::primary("k1");
/// let jwk = key.jwk_json();
/// let token = key.sign(&claims)?;
/// ```
#[derive(Debug, Clone)]
pub struct TestKeypair {
    pub kid: String,
    private_key_pem: &'static str,
    modulus: &'static str,
}

impl TestKeypair {
    /// The primary fixture key, published under `kid`.
    pub fn primary(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            private_key_pem: PRIMARY_PRIVATE_KEY_PEM,
            modulus: PRIMARY_MODULUS,
        }
    }

    /// A second, unrelated key. Useful for rotation and wrong-key tests.
    pub fn secondary(kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            private_key_pem: SECONDARY_PRIVATE_KEY_PEM,
            modulus: SECONDARY_MODULUS,
        }
    }

    /// Same key material under a different key ID.
    pub fn with_kid(&self, kid: &str) -> Self {
        Self {
            kid: kid.to_string(),
            ..self.clone()
        }
    }

    /// The base64url modulus as published in the JWKS.
    pub fn modulus(&self) -> &'static str {
        self.modulus
    }

    /// The public half as a JWKS entry, the way an identity provider publishes it.
    pub fn jwk_json(&self) -> Value {
        json!({
            "kid": self.kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": self.modulus,
            "e": TEST_RSA_EXPONENT,
        })
    }

    /// Encoding key for signing test tokens.
    pub fn encoding_key(&self) -> Result<EncodingKey, FixtureError> {
        EncodingKey::from_rsa_pem(self.private_key_pem.as_bytes())
            .map_err(|e| FixtureError::Key(e.to_string()))
    }

    /// Sign `claims` with RS256 and this key's `kid` in the header.
    pub fn sign(&self, claims: &Value) -> Result<String, FixtureError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    /// Sign `claims` with an arbitrary header (e.g. RS512, no `kid`).
    pub fn sign_with_header(&self, header: &Header, claims: &Value) -> Result<String, FixtureError> {
        encode(header, claims, &self.encoding_key()?)
            .map_err(|e| FixtureError::Signing(e.to_string()))
    }
}

/// Build an unsigned `alg: none` token carrying `kid`.
pub fn unsigned_token(kid: &str, claims: &Value) -> String {
    let header = json!({"alg": "none", "typ": "JWT", "kid": kid});
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Build an HS256 token "signed" with `secret`.
///
/// Models the algorithm-confusion attack where the public key is used as an
/// HMAC secret.
pub fn hmac_token(kid: &str, secret: &[u8], claims: &Value) -> Result<String, FixtureError> {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret))
        .map_err(|e| FixtureError::Signing(e.to_string()))
}

/// Replace the payload segment of a signed token, keeping header and signature.
pub fn tamper_payload(token: &str, claims: &Value) -> String {
    let mut parts = token.split('.');
    let header = parts.next().unwrap_or_default();
    let _payload = parts.next();
    let signature = parts.next().unwrap_or_default();
    format!(
        "{}.{}.{}",
        header,
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        signature
    )
}
