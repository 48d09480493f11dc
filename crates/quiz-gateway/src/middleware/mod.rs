//! Gateway middleware.
//!
//! Authentication lives in `quiz_auth::middleware`; this module only adds
//! gateway-level request metrics.

pub mod http_metrics;

pub use http_metrics::http_metrics_middleware;
