//! gRPC authentication boundary.
//!
//! Every entry point runs one routine, [`authorize_call`]: consult the
//! method policy, let exempt methods through untouched, authenticate
//! everything else. How a caller is authenticated is decided once, at
//! construction, by the [`Authenticator`]:
//!
//! - [`VerifyingAuthenticator`] - edge services; validates the bearer token
//! - [`TrustingAuthenticator`] - internal services behind the edge; accepts
//!   propagated identity metadata without verification
//!
//! Unary and streaming calls are covered at the transport level by
//! [`GrpcAuthLayer`]. Stream handlers that work through the [`ServerStream`]
//! abstraction use [`StreamInterceptor`] to get an [`IdentityStream`].

pub mod auth_layer;
pub mod authenticator;
pub mod stream;

pub use auth_layer::{GrpcAuthLayer, GrpcAuthService};
pub use authenticator::{
    authorize_call, Authenticator, TrustingAuthenticator, VerifyingAuthenticator,
};
pub use stream::{GrpcServerStream, IdentityStream, ServerStream, StreamInterceptor};
