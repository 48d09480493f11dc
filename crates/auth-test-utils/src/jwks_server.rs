//! Mock identity provider serving a realm's JWKS endpoint.
//!
//! Wraps a `wiremock::MockServer` mounted at
//! `/realms/{realm}/protocol/openid-connect/certs` and exposes request
//! counting so tests can assert how many key fetches happened.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::crypto_fixtures::TestKeypair;

/// Build a JWKS document publishing `keys`.
pub fn jwks_document(keys: &[&TestKeypair]) -> Value {
    json!({
        "keys": keys.iter().map(|k| k.jwk_json()).collect::<Vec<_>>()
    })
}

/// Path of the certs endpoint for `realm`.
pub fn certs_path(realm: &str) -> String {
    format!("/realms/{realm}/protocol/openid-connect/certs")
}

/// Mock identity provider for a single realm.
///
/// # Example
/// ```rust,ignore
/// let idp = MockJwksServer::start("quiz", &[&TestKeypair::primary("k1")]).await;
/// // ... validate tokens against idp.base_url() ...
/// assert_eq!(idp.fetch_count().await, 1);
/// ```
pub struct MockJwksServer {
    server: MockServer,
    realm: String,
}

impl MockJwksServer {
    /// Start a server publishing `keys`.
    pub async fn start(realm: &str, keys: &[&TestKeypair]) -> Self {
        Self::start_with_jwks(realm, jwks_document(keys)).await
    }

    /// Start a server publishing an arbitrary JWKS body.
    pub async fn start_with_jwks(realm: &str, jwks: Value) -> Self {
        Self::start_with_response(realm, ResponseTemplate::new(200).set_body_json(jwks)).await
    }

    /// Start a server that answers `keys` after `delay`.
    pub async fn start_slow(realm: &str, keys: &[&TestKeypair], delay: Duration) -> Self {
        Self::start_with_response(
            realm,
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(keys))
                .set_delay(delay),
        )
        .await
    }

    /// Start a server whose certs endpoint always fails with `status`.
    pub async fn start_failing(realm: &str, status: u16) -> Self {
        Self::start_with_response(realm, ResponseTemplate::new(status)).await
    }

    async fn start_with_response(realm: &str, response: ResponseTemplate) -> Self {
        let server = MockServer::start().await;
        let idp = Self {
            server,
            realm: realm.to_string(),
        };
        idp.mount(response).await;
        idp
    }

    async fn mount(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(certs_path(&self.realm)))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Replace the published key set.
    ///
    /// Resets the server, so the fetch count starts again from zero.
    pub async fn publish(&self, keys: &[&TestKeypair]) {
        self.server.reset().await;
        self.mount(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .await;
    }

    /// Make the certs endpoint fail with `status` from now on.
    ///
    /// Resets the server, so the fetch count starts again from zero.
    pub async fn fail_with(&self, status: u16) {
        self.server.reset().await;
        self.mount(ResponseTemplate::new(status)).await;
    }

    /// Base URL of the identity provider (no trailing slash).
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Realm served by this mock.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Expected `iss` for tokens from this realm.
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.server.uri(), self.realm)
    }

    /// Full certs URL.
    pub fn certs_url(&self) -> String {
        format!("{}{}", self.server.uri(), certs_path(&self.realm))
    }

    /// Number of requests received by the certs endpoint since start/reset.
    pub async fn fetch_count(&self) -> usize {
        let certs = certs_path(&self.realm);
        self.server
            .received_requests()
            .await
            .map(|requests| requests.iter().filter(|r| r.url.path() == certs).count())
            .unwrap_or(0)
    }
}
