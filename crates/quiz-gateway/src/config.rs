//! Gateway configuration.
//!
//! Loaded from environment variables. Authentication settings are parsed by
//! [`quiz_auth::AuthConfig`] from the same variables.

use quiz_auth::AuthConfig;
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default graceful shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Seconds to keep serving in-flight requests after a shutdown signal.
    pub drain_seconds: u64,

    /// Identity provider and key cache settings.
    pub auth: AuthConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Auth(#[from] quiz_auth::config::ConfigError),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid drain period: {0}")]
    InvalidDrainSeconds(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth = AuthConfig::from_vars(vars)?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        bind_address.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidBindAddress(format!(
                "BIND_ADDRESS must be host:port, got '{}': {}",
                bind_address, e
            ))
        })?;

        let drain_seconds = match vars.get("GATEWAY_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse::<u64>().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "GATEWAY_DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Config {
            bind_address,
            drain_seconds,
            auth,
        })
    }

    /// Parsed bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|e| ConfigError::InvalidBindAddress(format!("{}: {}", self.bind_address, e)))
    }
}
