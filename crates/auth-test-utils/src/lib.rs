//! # Auth Test Utilities
//!
//! Shared test utilities for the quiz platform auth core and gateway.
//!
//! This crate provides:
//! - Deterministic RSA key fixtures (fixed keys for reproducible tests)
//! - Identity-provider style claim builders (`TestTokenBuilder`)
//! - A mock JWKS endpoint with request counting (`MockJwksServer`)
//! - Fixed test identifiers (realm, users, key IDs)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestKeypair::primary(TEST_KEY_ID_1);
//!     let idp = MockJwksServer::start(TEST_REALM, &[&key]).await;
//!
//!     let token = TestTokenBuilder::new()
//!         .for_user(TEST_USER_ALICE)
//!         .issued_by(&idp.issuer())
//!         .sign(&key)?;
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use test_ids::*;
pub use token_builders::*;
