//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating identity-provider style access token
//! claims (realm roles, resource roles, scope, session state).

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

use crate::crypto_fixtures::{FixtureError, TestKeypair};

/// Builder for creating test JWT claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice-id")
///     .with_username("alice")
///     .issued_by("http://idp/realms/quiz")
///     .expires_in(3600)
///     .sign(&TestKeypair::primary("k1"))?;
/// ```
pub struct TestTokenBuilder {
    sub: String,
    username: String,
    email: String,
    email_verified: bool,
    iss: String,
    scope: String,
    exp: i64,
    iat: i64,
    realm_roles: Vec<String>,
    resource_roles: Map<String, Value>,
    session_state: Option<String>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            username: "test-user".to_string(),
            email: "test-user@example.com".to_string(),
            email_verified: true,
            iss: "http://localhost/realms/quiz".to_string(),
            scope: "openid profile email".to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            realm_roles: Vec::new(),
            resource_roles: Map::new(),
            session_state: None,
        }
    }

    /// Set the subject (user ID)
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Set `preferred_username`
    pub fn with_username(mut self, username: &str) -> Self {
        self.username = username.to_string();
        self
    }

    /// Set `email` and `email_verified`
    pub fn with_email(mut self, email: &str, verified: bool) -> Self {
        self.email = email.to_string();
        self.email_verified = verified;
        self
    }

    /// Set the issuer (`{base_url}/realms/{realm}`)
    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set the scope (space-separated)
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = scope.to_string();
        self
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Set `realm_access.roles`
    pub fn with_realm_roles(mut self, roles: &[&str]) -> Self {
        self.realm_roles = roles.iter().map(ToString::to_string).collect();
        self
    }

    /// Add `resource_access.{client}.roles`
    pub fn with_resource_roles(mut self, client: &str, roles: &[&str]) -> Self {
        self.resource_roles
            .insert(client.to_string(), json!({ "roles": roles }));
        self
    }

    /// Set `session_state`
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_state = Some(session_id.to_string());
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = json!({
            "sub": self.sub,
            "iss": self.iss,
            "exp": self.exp,
            "iat": self.iat,
            "typ": "Bearer",
            "preferred_username": self.username,
            "email": self.email,
            "email_verified": self.email_verified,
            "scope": self.scope,
            "realm_access": { "roles": self.realm_roles },
            "resource_access": self.resource_roles,
        });
        if let (Some(session), Some(obj)) = (self.session_state, claims.as_object_mut()) {
            obj.insert("session_state".to_string(), Value::String(session));
        }
        claims
    }

    /// Build and sign with RS256 under the keypair's `kid`
    pub fn sign(self, keypair: &TestKeypair) -> Result<String, FixtureError> {
        keypair.sign(&self.build())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
