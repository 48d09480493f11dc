//! Quiz platform edge gateway.
//!
//! The externally reachable HTTP entry point. Every request passes the
//! `quiz-auth` edge middleware: spoofed identity headers are stripped,
//! public paths go through, everything else needs a valid bearer token.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `observability` - Prometheus recorder and gateway metrics
//! - `routes` - Axum router setup

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
