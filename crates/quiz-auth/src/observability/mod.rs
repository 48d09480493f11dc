//! Observability for the auth core.
//!
//! The crate only records through the `metrics` facade; installing an
//! exporter is the embedding binary's job.

pub mod metrics;
