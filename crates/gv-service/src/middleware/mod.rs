//! Middleware for the group viewing HTTP boundary.
//!
//! - `identity` - resolves the caller from upstream identity headers
//! - `http_metrics` - records request metrics for every response

pub mod http_metrics;
pub mod identity;

pub use http_metrics::http_metrics_middleware;
pub use identity::require_identity;
