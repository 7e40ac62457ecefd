//! Logging configuration shared by the group viewing binaries.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Fallback filter directive used when `RUST_LOG` is unset
    /// (e.g. `gv_service=debug,tower_http=debug`)
    pub log_filter: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Install(String),
}

impl ObservabilityConfig {
    /// Install the global `tracing` subscriber.
    ///
    /// `RUST_LOG` wins over `log_filter` when set.
    ///
    /// # Errors
    ///
    /// Returns `LoggingError` if the filter does not parse or a global
    /// subscriber is already installed.
    pub fn init_tracing(&self) -> Result<(), LoggingError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&self.log_filter)
                .map_err(|e| LoggingError::InvalidFilter(e.to_string()))?,
        };

        let registry = tracing_subscriber::registry().with(filter);
        let result = if self.json_logs {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
        } else {
            registry.with(tracing_subscriber::fmt::layer()).try_init()
        };

        result.map_err(|e| LoggingError::Install(e.to_string()))
    }
}
