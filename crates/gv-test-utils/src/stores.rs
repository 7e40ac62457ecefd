//! Session store test doubles.

use async_trait::async_trait;
use common::types::SessionId;
use gv_service::session::{Session, SessionFilter};
use gv_service::store::{InMemorySessionStore, SessionStore, StoreError};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory store whose operations can be switched to fail or stall.
///
/// Clones share state, so a test can keep one clone to flip failures while
/// the coordinator owns another.
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: Arc<InMemorySessionStore>,
    fail_saves: Arc<AtomicBool>,
    fail_loads: Arc<AtomicBool>,
    fail_lists: Arc<AtomicBool>,
    fail_pings: Arc<AtomicBool>,
    load_delay_ms: Arc<AtomicU64>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pings(&self, fail: bool) {
        self.fail_pings.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `load` sleep for `delay` before answering.
    pub fn delay_loads(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.load_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// The backing store, for inspecting what was persisted.
    pub fn inner(&self) -> &InMemorySessionStore {
        &self.inner
    }
}

fn injected(op: &str) -> StoreError {
    StoreError::Backend(format!("injected {op} failure"))
}

#[async_trait]
impl SessionStore for FailingStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let delay = self.load_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(injected("load"));
        }
        self.inner.load(id).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(injected("save"));
        }
        self.inner.save(session).await
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(injected("list"));
        }
        self.inner.list(filter).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.fail_pings.load(Ordering::SeqCst) {
            return Err(injected("ping"));
        }
        Ok(())
    }
}

/// Store wrapper counting calls per operation.
#[derive(Clone)]
pub struct CountingStore {
    inner: Arc<dyn SessionStore>,
    loads: Arc<AtomicUsize>,
    saves: Arc<AtomicUsize>,
    lists: Arc<AtomicUsize>,
}

impl Default for CountingStore {
    fn default() -> Self {
        Self::wrapping(Arc::new(InMemorySessionStore::new()))
    }
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrapping(inner: Arc<dyn SessionStore>) -> Self {
        Self {
            inner,
            loads: Arc::new(AtomicUsize::new(0)),
            saves: Arc::new(AtomicUsize::new(0)),
            lists: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for CountingStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(id).await
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(session).await
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list(filter).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
