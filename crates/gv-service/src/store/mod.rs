//! Session persistence.
//!
//! The coordinator persists whole aggregates through the [`SessionStore`]
//! trait. Every committed mutation is written through before it becomes
//! visible, so a store always holds the latest committed state.
//!
//! Adapters:
//! - [`memory::InMemorySessionStore`]: process-local, default backend
//! - [`redis::RedisSessionStore`]: one JSON document per session

pub mod memory;
pub mod redis;

pub use memory::InMemorySessionStore;
pub use self::redis::RedisSessionStore;

use crate::session::{Session, SessionFilter};
use async_trait::async_trait;
use common::types::SessionId;
use thiserror::Error;

/// Errors raised by store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable or command failed.
    #[error("store backend error: {0}")]
    Backend(String),

    /// Stored document could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Pluggable session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session by id. `Ok(None)` when it does not exist.
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError>;

    /// Insert or replace a session.
    async fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Sessions matching `filter`, in creation order, paginated.
    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError>;

    /// Cheap reachability check used by `/ready`.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
