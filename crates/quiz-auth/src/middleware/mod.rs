//! HTTP middleware for the edge gateway.

pub mod auth;

pub use auth::{extract_bearer_token, require_auth, AuthState};
