//! Common utilities shared across the quiz platform crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (header inspection, size limits, `iat` checks)
pub mod jwt;
