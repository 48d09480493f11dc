//! Signing key cache backed by the realm's JWKS endpoint.
//!
//! The cache fetches `{base_url}/realms/{realm}/protocol/openid-connect/certs`,
//! keeps the RSA signing keys it can use, and serves them until the TTL
//! expires. An unknown `kid` against a fresh key set triggers a refresh only
//! once the key set is older than the refresh cooldown, so key rotation is
//! picked up promptly while forged `kid` values cannot flood the identity
//! provider.
//!
//! # Concurrency
//!
//! - The key map sits behind a `tokio::sync::RwLock`; lookups take the read lock
//! - A refresh holds the write lock for the whole fetch, so at most one fetch
//!   is in flight; waiters that find the key set already replaced reuse it
//! - Each refresh is replaced wholesale, never merged
//! - The fetch runs in a spawned task, so a cancelled caller does not abort it
//!
//! # Security
//!
//! - Only `kty: RSA` keys with `use: sig` (or no `use`) are kept
//! - Fetch failures are never cached and leave the previous key set in place
//! - Expired key sets are never served

use crate::config::AuthConfig;
use crate::errors::AuthError;
use crate::observability::metrics;
use common::jwt::decode_rsa_component;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

/// JSON Web Key as published by the identity provider.
///
/// Every field is optional so that one odd entry cannot fail the whole set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for usable keys).
    #[serde(default)]
    pub kty: Option<String>,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Key use ("sig" for signing; "enc" keys are skipped).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Algorithm the key is meant for.
    #[serde(default)]
    pub alg: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS response body. Entries are parsed one by one.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

/// Why a JWKS entry was not turned into a [`SigningKey`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JwkRejection {
    #[error("key type is not RSA")]
    NotRsa,

    #[error("key is not a signing key")]
    NotSigning,

    #[error("key algorithm is not an RSA signature algorithm")]
    UnsupportedAlgorithm,

    #[error("key has no kid")]
    MissingKid,

    #[error("key is missing modulus or exponent")]
    MissingComponent,

    #[error("key component is not valid base64url")]
    InvalidEncoding,
}

/// Map an algorithm name to an RSA-family signature algorithm.
///
/// Returns `None` for everything else, including `none` and HMAC.
pub fn rsa_algorithm(name: &str) -> Option<Algorithm> {
    match name {
        "RS256" => Some(Algorithm::RS256),
        "RS384" => Some(Algorithm::RS384),
        "RS512" => Some(Algorithm::RS512),
        "PS256" => Some(Algorithm::PS256),
        "PS384" => Some(Algorithm::PS384),
        "PS512" => Some(Algorithm::PS512),
        _ => None,
    }
}

/// An RSA public key usable for token verification.
///
/// Immutable once built. Holds a pre-built `DecodingKey` so a cache hit
/// needs no further decoding.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Option<Algorithm>,
    modulus: Vec<u8>,
    exponent: Vec<u8>,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Build a signing key from a JWKS entry.
    ///
    /// # Errors
    ///
    /// Returns the [`JwkRejection`] describing why the entry is unusable.
    pub fn from_jwk(jwk: &Jwk) -> Result<Self, JwkRejection> {
        if jwk.kty.as_deref() != Some("RSA") {
            return Err(JwkRejection::NotRsa);
        }

        if let Some(key_use) = jwk.key_use.as_deref() {
            if key_use != "sig" {
                return Err(JwkRejection::NotSigning);
            }
        }

        let algorithm = match jwk.alg.as_deref() {
            Some(alg) => Some(rsa_algorithm(alg).ok_or(JwkRejection::UnsupportedAlgorithm)?),
            None => None,
        };

        let kid = jwk
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(JwkRejection::MissingKid)?;

        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            return Err(JwkRejection::MissingComponent);
        };

        let modulus = decode_rsa_component(n).map_err(|_| JwkRejection::InvalidEncoding)?;
        let exponent = decode_rsa_component(e).map_err(|_| JwkRejection::InvalidEncoding)?;
        if modulus.is_empty() || exponent.is_empty() {
            return Err(JwkRejection::MissingComponent);
        }

        let decoding_key = DecodingKey::from_rsa_raw_components(&modulus, &exponent);

        Ok(Self {
            kid: kid.to_string(),
            algorithm,
            modulus,
            exponent,
            decoding_key,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Algorithm declared by the JWK, if any.
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    /// Big-endian modulus bytes.
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Big-endian public exponent bytes.
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("modulus_bits", &(self.modulus.len() * 8))
            .finish_non_exhaustive()
    }
}

/// Tuning for a [`KeyCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCacheSettings {
    /// How long a fetched key set is served.
    pub ttl: Duration,

    /// Timeout of the JWKS request.
    pub fetch_timeout: Duration,

    /// Minimum key set age before an unknown kid may force a refresh.
    pub min_refresh_interval: Duration,
}

impl Default for KeyCacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(crate::config::DEFAULT_JWKS_CACHE_TTL_SECONDS),
            fetch_timeout: Duration::from_secs(crate::config::DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS),
            min_refresh_interval: Duration::from_secs(
                crate::config::DEFAULT_JWKS_MIN_REFRESH_SECONDS,
            ),
        }
    }
}

/// The current key set.
#[derive(Default)]
struct KeySet {
    keys: HashMap<String, Arc<SigningKey>>,

    /// When the current key set was fetched; `None` before the first fetch.
    last_refresh: Option<Instant>,

    /// Incremented on every successful refresh.
    generation: u64,
}

struct Inner {
    certs_url: String,
    http_client: reqwest::Client,
    settings: KeyCacheSettings,
    state: RwLock<KeySet>,
}

/// Signing key cache.
///
/// Cheap to clone; clones share the same key set.
#[derive(Clone)]
pub struct KeyCache {
    inner: Arc<Inner>,
}

impl KeyCache {
    /// Create a cache for `certs_url`.
    pub fn new(certs_url: String, settings: KeyCacheSettings) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self::with_http_client(certs_url, http_client, settings)
    }

    /// Create a cache from the auth configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.certs_url(),
            KeyCacheSettings {
                ttl: config.jwks_cache_ttl,
                fetch_timeout: config.jwks_fetch_timeout,
                min_refresh_interval: config.jwks_min_refresh_interval,
            },
        )
    }

    /// Create a cache with an injected HTTP client.
    ///
    /// `settings.fetch_timeout` is ignored; the client's own timeout applies.
    pub fn with_http_client(
        certs_url: String,
        http_client: reqwest::Client,
        settings: KeyCacheSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                certs_url,
                http_client,
                settings,
                state: RwLock::new(KeySet::default()),
            }),
        }
    }

    pub fn certs_url(&self) -> &str {
        &self.inner.certs_url
    }

    pub fn settings(&self) -> KeyCacheSettings {
        self.inner.settings
    }

    /// Get a signing key by key ID.
    ///
    /// Served from the cache while the key set is within its TTL. Otherwise
    /// (expired, never fetched, or unknown kid outside the cooldown) the key
    /// set is refreshed once and the lookup repeated.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeyNotFound` if the kid is absent after a refresh, or
    ///   absent from a key set younger than the refresh cooldown
    /// - `AuthError::KeyFetchFailure` if the key set could not be fetched
    #[instrument(skip_all, name = "auth.jwks.get_key")]
    pub async fn get_key(&self, kid: &str) -> Result<Arc<SigningKey>, AuthError> {
        let observed_generation = {
            let state = self.inner.state.read().await;
            if let Some(refreshed_at) = state.last_refresh {
                let age = refreshed_at.elapsed();
                if age < self.inner.settings.ttl {
                    if let Some(key) = state.keys.get(kid) {
                        metrics::record_jwks_cache_lookup("hit");
                        return Ok(Arc::clone(key));
                    }

                    if age < self.inner.settings.min_refresh_interval {
                        tracing::debug!(
                            target: "auth.jwks",
                            age_secs = age.as_secs(),
                            "Unknown key ID within refresh cooldown"
                        );
                        metrics::record_jwks_cache_lookup("miss");
                        return Err(AuthError::KeyNotFound);
                    }
                }
            }
            state.generation
        };

        metrics::record_jwks_cache_lookup("refresh");

        // Detached so that a cancelled caller does not abort the fetch
        let inner = Arc::clone(&self.inner);
        let kid = kid.to_string();
        let refresh =
            tokio::spawn(async move { inner.refresh_and_lookup(&kid, observed_generation).await });

        refresh.await.unwrap_or_else(|e| {
            tracing::error!(target: "auth.jwks", error = %e, "JWKS refresh task failed");
            Err(AuthError::KeyFetchFailure("refresh task failed".to_string()))
        })
    }

    /// Fetch the key set now, regardless of TTL.
    ///
    /// Used to warm the cache at startup and by readiness probes. Callers
    /// that queued behind a refresh completed while they waited reuse its
    /// result instead of fetching again. Returns the number of usable keys.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyFetchFailure` if the key set could not be fetched;
    /// the previous key set is left in place.
    #[instrument(skip_all, name = "auth.jwks.force_refresh")]
    pub async fn force_refresh(&self) -> Result<usize, AuthError> {
        let requested_at = Instant::now();

        let mut state = self.inner.state.write().await;
        if state.last_refresh.is_some_and(|at| at >= requested_at) {
            tracing::debug!(target: "auth.jwks", "JWKS already refreshed by a concurrent caller");
        } else {
            self.inner.refresh_locked(&mut state).await?;
        }
        Ok(state.keys.len())
    }

    /// Number of keys in the current key set.
    pub async fn key_count(&self) -> usize {
        self.inner.state.read().await.keys.len()
    }
}

impl Inner {
    /// Refresh unless someone else already did, then look `kid` up.
    async fn refresh_and_lookup(
        &self,
        kid: &str,
        observed_generation: u64,
    ) -> Result<Arc<SigningKey>, AuthError> {
        let mut state = self.state.write().await;

        if state.generation == observed_generation {
            self.refresh_locked(&mut state).await?;
        } else {
            tracing::debug!(target: "auth.jwks", "JWKS already refreshed by a concurrent caller");
        }

        state.keys.get(kid).cloned().ok_or_else(|| {
            tracing::debug!(target: "auth.jwks", "Key ID not found in JWKS after refresh");
            AuthError::KeyNotFound
        })
    }

    /// Replace the key set. The caller holds the write lock.
    async fn refresh_locked(&self, state: &mut KeySet) -> Result<(), AuthError> {
        let keys = self.fetch().await?;

        if keys.is_empty() {
            tracing::warn!(target: "auth.jwks", "JWKS contained no usable signing keys");
        }

        tracing::info!(
            target: "auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        state.keys = keys;
        state.last_refresh = Some(Instant::now());
        state.generation = state.generation.wrapping_add(1);
        Ok(())
    }

    /// Fetch and parse the key set.
    async fn fetch(&self) -> Result<HashMap<String, Arc<SigningKey>>, AuthError> {
        tracing::debug!(target: "auth.jwks", url = %self.certs_url, "Fetching JWKS");
        let start = Instant::now();

        let response = self
            .http_client
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "auth.jwks", error = %e, "Failed to fetch JWKS");
                metrics::record_jwks_fetch("network_error", start.elapsed());
                AuthError::KeyFetchFailure("identity provider unreachable".to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            metrics::record_jwks_fetch("http_error", start.elapsed());
            return Err(AuthError::KeyFetchFailure(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let document: JwksDocument = response.json().await.map_err(|e| {
            tracing::error!(target: "auth.jwks", error = %e, "Failed to parse JWKS response");
            metrics::record_jwks_fetch("invalid_response", start.elapsed());
            AuthError::KeyFetchFailure("invalid JWKS response".to_string())
        })?;

        metrics::record_jwks_fetch("success", start.elapsed());
        Ok(parse_key_set(document.keys))
    }
}

/// Build the key map, skipping entries that are not usable RSA signing keys.
fn parse_key_set(entries: Vec<serde_json::Value>) -> HashMap<String, Arc<SigningKey>> {
    let mut keys = HashMap::with_capacity(entries.len());

    for entry in entries {
        let jwk: Jwk = match serde_json::from_value(entry) {
            Ok(jwk) => jwk,
            Err(e) => {
                tracing::debug!(target: "auth.jwks", error = %e, "Skipping unparseable JWKS entry");
                continue;
            }
        };

        match SigningKey::from_jwk(&jwk) {
            Ok(key) => {
                keys.insert(key.kid.clone(), Arc::new(key));
            }
            Err(reason) => {
                tracing::debug!(
                    target: "auth.jwks",
                    kid = jwk.kid.as_deref().unwrap_or(""),
                    reason = %reason,
                    "Skipping JWKS entry"
                );
            }
        }
    }

    keys
}
