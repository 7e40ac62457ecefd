//! Redis session store.
//!
//! # Key Patterns
//!
//! - `gv:session:{id}` - session aggregate (JSON)
//! - `gv:sessions` - SET of all session ids
//!
//! Listing reads the id index, fetches documents with `MGET`, sorts by id
//! (creation order) and filters in process. Session volume per deployment is
//! small enough that a secondary index per filter field is not worth it.
//!
//! The `MultiplexedConnection` is cheap to clone and safe to use concurrently;
//! each operation clones it.

use super::{SessionStore, StoreError};
use crate::session::{Session, SessionFilter};
use async_trait::async_trait;
use common::types::SessionId;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{debug, error, instrument};

/// SET holding every stored session id.
const INDEX_KEY: &str = "gv:sessions";

fn session_key(id: &SessionId) -> String {
    format!("gv:session:{id}")
}

/// Redis-backed [`SessionStore`].
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: MultiplexedConnection,
}

impl RedisSessionStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Backend` if the URL is invalid or the connection
    /// fails.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Never log the URL: it may embed credentials
            error!(target: "gv.store.redis", error = %e, "Failed to open Redis client");
            StoreError::Backend(format!("failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "gv.store.redis", error = %e, "Failed to connect to Redis");
                StoreError::Backend(format!("failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection })
    }
}

fn backend(op: &'static str) -> impl Fn(redis::RedisError) -> StoreError {
    move |e| {
        error!(target: "gv.store.redis", operation = op, error = %e, "Redis command failed");
        StoreError::Backend(format!("{op} failed: {e}"))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[instrument(skip_all, fields(session_id = %id))]
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(session_key(id)).await.map_err(backend("GET"))?;

        raw.map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }

    #[instrument(skip_all, fields(session_id = %session.id))]
    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let json = serde_json::to_string(session)?;
        let mut conn = self.connection.clone();

        redis::pipe()
            .atomic()
            .set(session_key(&session.id), json)
            .ignore()
            .sadd(INDEX_KEY, session.id.to_string())
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend("SET"))?;

        debug!(
            target: "gv.store.redis",
            session_id = %session.id,
            events = session.events.len(),
            "Session saved"
        );
        Ok(())
    }

    #[instrument(skip_all)]
    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
        let mut conn = self.connection.clone();
        let ids: Vec<String> = conn.smembers(INDEX_KEY).await.map_err(backend("SMEMBERS"))?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| format!("gv:session:{id}")).collect();
        let docs: Vec<Option<String>> = conn.mget(&keys).await.map_err(backend("MGET"))?;

        let mut sessions = Vec::with_capacity(docs.len());
        for json in docs.into_iter().flatten() {
            sessions.push(serde_json::from_str::<Session>(&json)?);
        }
        sessions.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(filter.apply(sessions))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(backend("PING"))?;
        Ok(())
    }
}
