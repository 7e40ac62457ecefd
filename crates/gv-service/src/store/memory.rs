//! In-memory session store.

use super::{SessionStore, StoreError};
use crate::session::{Session, SessionFilter};
use async_trait::async_trait;
use common::types::SessionId;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Process-local store. Keyed by UUIDv7 id, so iteration order is creation
/// order.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<BTreeMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(filter.apply(sessions.values().cloned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::session::test_support::*;
    use crate::session::SessionStatus;

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemorySessionStore::new();
        let session = instructor_session();

        assert!(store.load(&session.id).await.unwrap().is_none());
        store.save(&session).await.unwrap();
        assert_eq!(store.load(&session.id).await.unwrap(), Some(session.clone()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_save_replaces() {
        let store = InMemorySessionStore::new();
        let mut session = instructor_session();
        store.save(&session).await.unwrap();

        session.end(at(5)).unwrap();
        store.save(&session).await.unwrap();

        let loaded = store.load(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SessionStatus::Ended);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let store = InMemorySessionStore::new();
        let first = instructor_session();
        let second = student_session();
        let third = instructor_session();
        // Save out of order
        for s in [&third, &first, &second] {
            store.save(s).await.unwrap();
        }

        let ids: Vec<_> = store
            .list(&SessionFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);

        let by_host = SessionFilter {
            host_id: Some("stu-1".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list(&by_host).await.unwrap().len(), 1);
    }
}
