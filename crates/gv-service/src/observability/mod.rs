//! Observability: Prometheus metrics and health checks.

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
