//! Quiz platform authentication core.
//!
//! Verifies identity-provider access tokens against a cached, rotating
//! JWKS and enforces one authorization policy at both the HTTP edge and the
//! gRPC service boundary. Verified identities travel east-west as plain
//! metadata, accepted by internal services in trusting mode.
//!
//! # Components
//!
//! - [`jwks::KeyCache`] - signing key cache with TTL and unknown-kid refresh
//! - [`jwt::TokenValidator`] - RSA signature, expiry, `iat` and issuer checks
//! - [`policy::MethodPolicy`] / [`policy::PublicPaths`] - fail-closed exemptions
//! - [`middleware::require_auth`] - axum edge middleware
//! - [`grpc::GrpcAuthLayer`] / [`grpc::StreamInterceptor`] - gRPC boundary
//! - [`propagation`] - identity metadata codec and client interceptor

pub mod claims;
pub mod config;
pub mod errors;
pub mod grpc;
pub mod identity;
pub mod jwks;
pub mod jwt;
pub mod middleware;
pub mod observability;
pub mod policy;
pub mod propagation;

pub use claims::Claims;
pub use config::AuthConfig;
pub use errors::AuthError;
pub use identity::{AuthContext, IdentityExt};
pub use jwks::KeyCache;
pub use jwt::TokenValidator;
pub use policy::{MethodPolicy, PublicPaths};
