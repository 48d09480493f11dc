//! JWT claims structure.
//!
//! Mirrors the access token payload issued by the realm. The `sub` and
//! `email` fields are redacted in Debug output to prevent exposure in logs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Role list under `realm_access` or one `resource_access` client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims of a validated access token.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID) - redacted in Debug output.
    pub sub: String,

    /// Issuer (`{base_url}/realms/{realm}`). Presence is enforced by the validator.
    #[serde(default)]
    pub iss: String,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    #[serde(default)]
    pub preferred_username: String,

    /// E-mail address - redacted in Debug output.
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub email_verified: bool,

    #[serde(default)]
    pub realm_access: RoleAccess,

    /// Per-client roles keyed by client ID.
    #[serde(default)]
    pub resource_access: HashMap<String, RoleAccess>,

    /// Space-separated scopes granted to this token.
    #[serde(default)]
    pub scope: String,

    /// Identity provider session.
    #[serde(default, rename = "session_state", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Custom Debug implementation that redacts identifying fields.
impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iss", &self.iss)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("preferred_username", &self.preferred_username)
            .field("email", &"[REDACTED]")
            .field("email_verified", &self.email_verified)
            .field("realm_access", &self.realm_access)
            .field("resource_access", &self.resource_access)
            .field("scope", &self.scope)
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl Claims {
    /// Check if the token has a specific scope.
    ///
    /// Scopes are space-separated in the JWT claims.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }

    /// Get all scopes as a vector.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }

    /// Realm-level roles.
    pub fn realm_roles(&self) -> &[String] {
        &self.realm_access.roles
    }

    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_access.roles.iter().any(|r| r == role)
    }

    /// Check a role granted by a specific client (`resource_access.{client}.roles`).
    pub fn has_resource_role(&self, client: &str, role: &str) -> bool {
        self.resource_access
            .get(client)
            .is_some_and(|access| access.roles.iter().any(|r| r == role))
    }
}
