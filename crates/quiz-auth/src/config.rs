//! Auth core configuration.
//!
//! Loaded from environment variables. The identity provider base URL and
//! realm are required; everything else has a default.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default JWKS cache TTL in seconds (5 minutes).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 300;

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Default minimum interval between unknown-kid refreshes, in seconds.
pub const DEFAULT_JWKS_MIN_REFRESH_SECONDS: u64 = 10;

/// Identity provider and token validation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Identity provider base URL, without trailing slash.
    pub idp_base_url: String,

    /// Realm whose keys sign accepted tokens.
    pub realm: String,

    /// How long a fetched key set is served without refetching.
    pub jwks_cache_ttl: Duration,

    /// Client-side timeout for the JWKS request.
    pub jwks_fetch_timeout: Duration,

    /// Minimum age of the key set before an unknown kid may force a refresh.
    pub jwks_min_refresh_interval: Duration,

    /// Tolerance for `iat` in the future.
    pub clock_skew: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid identity provider URL: {0}")]
    InvalidIdpUrl(String),

    #[error("Invalid realm: {0}")]
    InvalidRealm(String),

    #[error("Invalid JWKS configuration: {0}")]
    InvalidJwks(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),
}

impl AuthConfig {
    /// Build a config for `idp_base_url`/`realm` with default tuning.
    pub fn new(idp_base_url: &str, realm: &str) -> Self {
        Self {
            idp_base_url: idp_base_url.trim_end_matches('/').to_string(),
            realm: realm.to_string(),
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECONDS),
            jwks_fetch_timeout: Duration::from_secs(DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
            jwks_min_refresh_interval: Duration::from_secs(DEFAULT_JWKS_MIN_REFRESH_SECONDS),
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let idp_base_url = required(vars, "IDP_BASE_URL")?;
        if !(idp_base_url.starts_with("http://") || idp_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidIdpUrl(format!(
                "IDP_BASE_URL must start with http:// or https://, got '{}'",
                idp_base_url
            )));
        }

        let realm = required(vars, "IDP_REALM")?;
        if realm.contains('/') {
            return Err(ConfigError::InvalidRealm(format!(
                "IDP_REALM must be a bare realm name, got '{}'",
                realm
            )));
        }

        let mut config = Self::new(&idp_base_url, &realm);

        if let Some(ttl) = parse_seconds(vars, "JWKS_CACHE_TTL_SECONDS")? {
            if ttl == 0 {
                return Err(ConfigError::InvalidJwks(
                    "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }
            config.jwks_cache_ttl = Duration::from_secs(ttl);
        }

        if let Some(timeout) = parse_seconds(vars, "JWKS_FETCH_TIMEOUT_SECONDS")? {
            if timeout == 0 {
                return Err(ConfigError::InvalidJwks(
                    "JWKS_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                ));
            }
            config.jwks_fetch_timeout = Duration::from_secs(timeout);
        }

        // Zero disables the cooldown: every unknown kid may refresh
        if let Some(interval) = parse_seconds(vars, "JWKS_MIN_REFRESH_SECONDS")? {
            config.jwks_min_refresh_interval = Duration::from_secs(interval);
        }

        if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwtClockSkew(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got 0".to_string(),
                ));
            }

            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            config.clock_skew = Duration::from_secs(value);
        }

        Ok(config)
    }

    /// Expected `iss` claim: `{base_url}/realms/{realm}`.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.idp_base_url, self.realm)
    }

    /// JWKS endpoint of the realm.
    pub fn certs_url(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.issuer())
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_seconds(vars: &HashMap<String, String>, name: &str) -> Result<Option<u64>, ConfigError> {
    vars.get(name)
        .map(|value_str| {
            value_str.parse::<u64>().map_err(|e| {
                ConfigError::InvalidJwks(format!(
                    "{} must be a valid non-negative integer, got '{}': {}",
                    name, value_str, e
                ))
            })
        })
        .transpose()
}
