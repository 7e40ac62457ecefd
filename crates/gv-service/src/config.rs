//! Group viewing service configuration.
//!
//! Configuration is loaded from environment variables. The Redis URL may
//! carry credentials and is held in a `SecretString`, redacted in Debug output.

use crate::coordinator::{CoordinatorConfig, DEFAULT_MAILBOX_CAPACITY};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_HTTP_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default shutdown grace period in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 10;

/// Default instance ID prefix.
pub const DEFAULT_INSTANCE_ID_PREFIX: &str = "gv";

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "gv_service=debug,tower_http=debug";

/// Where session aggregates are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local map. State is lost on restart.
    Memory,
    /// Redis, shared across restarts.
    Redis,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(ConfigError::InvalidValue(format!(
                "GV_STORE_BACKEND must be 'memory' or 'redis', got '{other}'"
            ))),
        }
    }
}

/// Group viewing service configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    pub store_backend: StoreBackend,

    /// Redis connection URL, required when `store_backend` is `Redis`.
    pub redis_url: Option<SecretString>,

    /// Bounded mailbox size per session actor (default: 500).
    pub mailbox_capacity: usize,

    /// Participant cap applied when a session is created without one.
    pub default_max_participants: Option<u32>,

    /// How long shutdown waits for session actors to drain (default: 10).
    pub shutdown_grace_seconds: u64,

    /// Emit JSON logs instead of the human-readable format.
    pub json_logs: bool,

    /// Unique identifier for this instance, attached to startup logs.
    pub instance_id: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("store_backend", &self.store_backend)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("mailbox_capacity", &self.mailbox_capacity)
            .field("default_max_participants", &self.default_max_participants)
            .field("shutdown_grace_seconds", &self.shutdown_grace_seconds)
            .field("json_logs", &self.json_logs)
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("GV_HTTP_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HTTP_BIND_ADDRESS.to_string());

        let store_backend = match vars.get("GV_STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => StoreBackend::Memory,
        };

        let redis_url = vars.get("REDIS_URL").cloned().map(SecretString::from);
        if store_backend == StoreBackend::Redis && redis_url.is_none() {
            return Err(ConfigError::MissingEnvVar("REDIS_URL".to_string()));
        }

        let mailbox_capacity: usize =
            parse_positive(vars, "GV_SESSION_MAILBOX_CAPACITY")?.unwrap_or(DEFAULT_MAILBOX_CAPACITY);

        let default_max_participants: Option<u32> =
            parse_positive(vars, "GV_MAX_PARTICIPANTS_DEFAULT")?;

        let shutdown_grace_seconds = match vars.get("GV_SHUTDOWN_GRACE_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidValue(format!(
                    "GV_SHUTDOWN_GRACE_SECONDS must be a valid non-negative integer, got '{value_str}': {e}"
                ))
            })?,
            None => DEFAULT_SHUTDOWN_GRACE_SECONDS,
        };

        let json_logs = match vars.get("GV_LOG_JSON").map(|v| v.trim().to_ascii_lowercase()) {
            None => false,
            Some(v) if v == "true" || v == "1" => true,
            Some(v) if v == "false" || v == "0" || v.is_empty() => false,
            Some(v) => {
                return Err(ConfigError::InvalidValue(format!(
                    "GV_LOG_JSON must be 'true' or 'false', got '{v}'"
                )))
            }
        };

        let instance_id = vars.get("GV_INSTANCE_ID").cloned().unwrap_or_else(|| {
            let hostname = env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_INSTANCE_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            bind_address,
            store_backend,
            redis_url,
            mailbox_capacity,
            default_max_participants,
            shutdown_grace_seconds,
            json_logs,
            instance_id,
        })
    }

    #[must_use]
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            mailbox_capacity: self.mailbox_capacity,
            default_max_participants: self.default_max_participants,
        }
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// Parse an optional integer that must be greater than zero.
fn parse_positive<T>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: fmt::Display,
{
    let Some(value_str) = vars.get(key) else {
        return Ok(None);
    };
    let value: T = value_str.parse().map_err(|e| {
        ConfigError::InvalidValue(format!(
            "{key} must be a valid positive integer, got '{value_str}': {e}"
        ))
    })?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue(format!(
            "{key} must be greater than 0"
        )));
    }
    Ok(Some(value))
}
