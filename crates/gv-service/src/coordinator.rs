//! Coordinator - routes operations to session actors.
//!
//! Owns the registry of live `SessionActor`s. A session without a live actor
//! (after a restart or eviction) is hydrated from the store on first
//! mutation. Ended sessions are evicted and never respawned; their reads are
//! served from the store.
//!
//! Hydration is serialized per session id. The registry lock is only held
//! for lookups and inserts, never across a store call, so a slow load for
//! one session does not stall any other.
//!
//! Sessions and polls returned from here are public views: anonymous polls
//! carry no responses. Their tallies come from [`Coordinator::poll_results`].
//!
//! # Shutdown
//!
//! [`Coordinator::shutdown`] stops accepting mutations, releases every actor
//! handle so actors drain their mailboxes and exit, then cancels whatever is
//! still running once the grace period elapses.

use crate::actors::{ActorMetrics, SessionActor, SessionActorHandle};
use crate::errors::GvError;
use crate::observability::metrics as prom;
use crate::session::{
    Caller, ControlOutcome, CreateSessionOptions, Event, EventOptions, EventType,
    LeaveOutcome, Participant, PlaybackAction, Poll, PollOptions, PollResults, ReactionKind,
    Session, SessionFilter, SessionStatus, SessionUpdate, SettingsOverrides,
};
use crate::store::SessionStore;
use chrono::Utc;
use common::types::{EventId, PollId, SessionId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default session mailbox capacity.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 500;

/// Tunables for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Bounded mailbox size per session actor.
    pub mailbox_capacity: usize,
    /// Participant cap applied when the creator sets none.
    pub default_max_participants: Option<u32>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            default_max_participants: None,
        }
    }
}

struct LiveSession {
    handle: SessionActorHandle,
    task: JoinHandle<()>,
}

/// Entry point for every session operation.
pub struct Coordinator {
    store: Arc<dyn SessionStore>,
    sessions: RwLock<HashMap<SessionId, LiveSession>>,
    /// One guard per session currently being loaded from the store.
    hydrating: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    cancel_token: CancellationToken,
    draining: AtomicBool,
    metrics: Arc<ActorMetrics>,
    config: CoordinatorConfig,
}

impl Coordinator {
    /// Create a coordinator with a fresh root cancellation token.
    pub fn new(store: Arc<dyn SessionStore>, config: CoordinatorConfig) -> Self {
        Self::with_cancel_token(store, config, CancellationToken::new())
    }

    /// Create a coordinator whose actors are children of `cancel_token`.
    pub fn with_cancel_token(
        store: Arc<dyn SessionStore>,
        config: CoordinatorConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
            hydrating: Mutex::new(HashMap::new()),
            cancel_token,
            draining: AtomicBool::new(false),
            metrics: ActorMetrics::new(),
            config,
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<ActorMetrics> {
        &self.metrics
    }

    /// Number of sessions with a live actor.
    pub async fn live_session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst) || self.cancel_token.is_cancelled()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create a session hosted by `host` and spawn its actor.
    pub async fn create_session(
        &self,
        name: &str,
        video_id: &str,
        host: Caller,
        mut settings: SettingsOverrides,
        options: CreateSessionOptions,
    ) -> Result<Session, GvError> {
        self.observe("create_session", async {
            self.ensure_accepting()?;
            if settings.max_participants.is_none() {
                settings.max_participants = Some(self.config.default_max_participants);
            }
            let session = Session::create(name, video_id, &host, &settings, options, Utc::now())?;
            self.timed_save(&session).await?;

            let (handle, task) = SessionActor::spawn(
                session.clone(),
                Arc::clone(&self.store),
                self.cancel_token.child_token(),
                Arc::clone(&self.metrics),
                self.config.mailbox_capacity,
            );
            self.sessions
                .write()
                .await
                .insert(session.id, LiveSession { handle, task });

            info!(
                target: "gv.coordinator",
                session_id = %session.id,
                host_id = %session.host_id,
                status = session.status.as_str(),
                "Session created"
            );
            Ok(session)
        })
        .await
    }

    /// Current state of a session. Never waits on the session's mailbox.
    pub async fn get_session(&self, id: &SessionId) -> Result<Session, GvError> {
        self.observe("get_session", async {
            let session = self.read_session(id).await?;
            Ok(Session::clone(&session).into_public())
        })
        .await
    }

    /// Sessions matching `filter`, in creation order.
    pub async fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, GvError> {
        self.observe("list_sessions", async {
            let started = Instant::now();
            let result = self.store.list(filter).await;
            prom::record_store_latency("list", started.elapsed());
            Ok(result?.into_iter().map(Session::into_public).collect())
        })
        .await
    }

    /// Active sessions for a video, including scheduled sessions whose start
    /// time has passed.
    pub async fn active_sessions_for_video(&self, video_id: &str) -> Result<Vec<Session>, GvError> {
        let filter = SessionFilter {
            video_id: Some(video_id.to_string()),
            ..Default::default()
        };
        let now = Utc::now();
        let sessions = self.list_sessions(&filter).await?;
        Ok(sessions
            .into_iter()
            .filter(|s| match s.status {
                SessionStatus::Active => true,
                SessionStatus::Scheduled => s.start_time <= now,
                SessionStatus::Ended => false,
            })
            .collect())
    }

    /// Update descriptive fields and settings without an authority check.
    pub async fn update_session(
        &self,
        id: &SessionId,
        update: SessionUpdate,
    ) -> Result<Session, GvError> {
        self.update(id, update, None).await
    }

    /// Update as `caller_id`, who must be the host when the change applies.
    pub async fn update_session_as(
        &self,
        id: &SessionId,
        caller_id: &str,
        update: SessionUpdate,
    ) -> Result<Session, GvError> {
        self.update(id, update, Some(caller_id.to_string())).await
    }

    async fn update(
        &self,
        id: &SessionId,
        update: SessionUpdate,
        caller_id: Option<String>,
    ) -> Result<Session, GvError> {
        self.observe("update_session", async {
            let session = self
                .with_actor(id, |h| async move { h.update(update, caller_id).await })
                .await?;
            Ok(Session::clone(&session).into_public())
        })
        .await
    }

    /// Activate a scheduled session early. Host only.
    pub async fn start_session(&self, id: &SessionId, caller_id: &str) -> Result<Session, GvError> {
        let caller_id = caller_id.to_string();
        self.observe("start_session", async {
            let session = self
                .with_actor(id, |h| async move { h.start(caller_id).await })
                .await?;
            Ok(Session::clone(&session).into_public())
        })
        .await
    }

    /// End the session without an authority check.
    pub async fn end_session(&self, id: &SessionId) -> Result<(), GvError> {
        self.end(id, None).await
    }

    /// End as `caller_id`, who must be the host when the end applies.
    pub async fn end_session_as(&self, id: &SessionId, caller_id: &str) -> Result<(), GvError> {
        self.end(id, Some(caller_id.to_string())).await
    }

    async fn end(&self, id: &SessionId, caller_id: Option<String>) -> Result<(), GvError> {
        self.observe("end_session", async {
            self.with_actor(id, |h| async move { h.end(caller_id).await })
                .await
        })
        .await
    }

    // ------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------

    pub async fn join(&self, id: &SessionId, caller: Caller) -> Result<Participant, GvError> {
        self.observe("join", async {
            self.with_actor(id, |h| async move { h.join(caller).await }).await
        })
        .await
    }

    pub async fn leave(&self, id: &SessionId, user_id: &str) -> Result<LeaveOutcome, GvError> {
        let user_id = user_id.to_string();
        self.observe("leave", async {
            self.with_actor(id, |h| async move { h.leave(user_id).await }).await
        })
        .await
    }

    pub async fn request_control(
        &self,
        id: &SessionId,
        user_id: &str,
    ) -> Result<ControlOutcome, GvError> {
        let user_id = user_id.to_string();
        self.observe("request_control", async {
            self.with_actor(id, |h| async move { h.request_control(user_id).await })
                .await
        })
        .await
    }

    pub async fn grant_control(
        &self,
        id: &SessionId,
        host_id: &str,
        target_id: &str,
    ) -> Result<Participant, GvError> {
        let (host_id, target_id) = (host_id.to_string(), target_id.to_string());
        self.observe("grant_control", async {
            self.with_actor(id, |h| async move { h.grant_control(host_id, target_id).await })
                .await
        })
        .await
    }

    pub async fn revoke_control(
        &self,
        id: &SessionId,
        host_id: &str,
        target_id: &str,
    ) -> Result<Participant, GvError> {
        let (host_id, target_id) = (host_id.to_string(), target_id.to_string());
        self.observe("revoke_control", async {
            self.with_actor(id, |h| async move { h.revoke_control(host_id, target_id).await })
                .await
        })
        .await
    }

    // ------------------------------------------------------------------
    // Event log
    // ------------------------------------------------------------------

    pub async fn post_event(
        &self,
        id: &SessionId,
        author_id: &str,
        event_type: EventType,
        content: &str,
        options: EventOptions,
    ) -> Result<Event, GvError> {
        let (author_id, content) = (author_id.to_string(), content.to_string());
        self.observe("post_event", async {
            self.with_actor(id, |h| async move {
                h.post_event(author_id, event_type, content, options).await
            })
            .await
        })
        .await
    }

    /// Events after `after_sequence`, for replay by a delivery layer.
    pub async fn events_since(
        &self,
        id: &SessionId,
        after_sequence: u64,
    ) -> Result<Vec<Event>, GvError> {
        self.observe("events_since", async {
            Ok(self.read_session(id).await?.events_since(after_sequence))
        })
        .await
    }

    pub async fn add_reaction(
        &self,
        id: &SessionId,
        event_id: &EventId,
        user_id: &str,
        kind: ReactionKind,
    ) -> Result<Event, GvError> {
        let (event_id, user_id) = (*event_id, user_id.to_string());
        self.observe("add_reaction", async {
            self.with_actor(id, |h| async move { h.add_reaction(event_id, user_id, kind).await })
                .await
        })
        .await
    }

    pub async fn remove_reaction(
        &self,
        id: &SessionId,
        event_id: &EventId,
        user_id: &str,
        kind: ReactionKind,
    ) -> Result<Event, GvError> {
        let (event_id, user_id) = (*event_id, user_id.to_string());
        self.observe("remove_reaction", async {
            self.with_actor(id, |h| async move {
                h.remove_reaction(event_id, user_id, kind).await
            })
            .await
        })
        .await
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    pub async fn issue_control(
        &self,
        id: &SessionId,
        user_id: &str,
        action: PlaybackAction,
        value: Option<f64>,
    ) -> Result<Event, GvError> {
        let user_id = user_id.to_string();
        self.observe("issue_control", async {
            self.with_actor(id, |h| async move { h.issue_control(user_id, action, value).await })
                .await
        })
        .await
    }

    // ------------------------------------------------------------------
    // Polls
    // ------------------------------------------------------------------

    pub async fn create_poll(
        &self,
        id: &SessionId,
        creator_id: &str,
        question: &str,
        options: Vec<String>,
        poll_options: PollOptions,
    ) -> Result<Poll, GvError> {
        let (creator_id, question) = (creator_id.to_string(), question.to_string());
        self.observe("create_poll", async {
            self.with_actor(id, |h| async move {
                h.create_poll(creator_id, question, options, poll_options)
                    .await
            })
            .await
            .map(Poll::into_public)
        })
        .await
    }

    /// Record the caller's answer and return the updated results.
    pub async fn respond_to_poll(
        &self,
        id: &SessionId,
        poll_id: &PollId,
        user_id: &str,
        user_name: &str,
        selected: Vec<usize>,
    ) -> Result<PollResults, GvError> {
        let (poll_id, user_id, user_name) = (*poll_id, user_id.to_string(), user_name.to_string());
        self.observe("respond_to_poll", async {
            let poll = self
                .with_actor(id, |h| async move {
                    h.respond_to_poll(poll_id, user_id, user_name, selected)
                        .await
                })
                .await?;
            Ok(poll.results())
        })
        .await
    }

    /// Tallies for a poll; also available after the session ends.
    pub async fn poll_results(
        &self,
        id: &SessionId,
        poll_id: &PollId,
    ) -> Result<PollResults, GvError> {
        self.observe("poll_results", async {
            self.read_session(id).await?.poll_results(poll_id)
        })
        .await
    }

    /// Whether the backing store answers. Used by `/ready`.
    pub async fn check_store(&self) -> Result<(), GvError> {
        let started = Instant::now();
        let result = self.store.ping().await;
        prom::record_store_latency("ping", started.elapsed());
        Ok(result?)
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Stop accepting mutations and wait up to `grace` for actors to drain.
    pub async fn shutdown(&self, grace: Duration) {
        self.draining.store(true, Ordering::SeqCst);
        let live: Vec<(SessionId, LiveSession)> = self.sessions.write().await.drain().collect();

        info!(
            target: "gv.coordinator",
            sessions = live.len(),
            grace_seconds = grace.as_secs(),
            "Coordinator draining"
        );

        let deadline = tokio::time::Instant::now() + grace;
        for (session_id, LiveSession { handle, mut task }) in live {
            // Dropping our handle lets the actor exit once in-flight callers finish
            drop(handle);
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(result) => self.reap(session_id, result),
                Err(_) => {
                    warn!(
                        target: "gv.coordinator",
                        session_id = %session_id,
                        "Session actor did not drain in time, cancelling"
                    );
                    task.abort();
                }
            }
        }

        self.cancel_token.cancel();
        info!(target: "gv.coordinator", "Coordinator shutdown complete");
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ensure_accepting(&self) -> Result<(), GvError> {
        if self.is_draining() {
            Err(GvError::Draining)
        } else {
            Ok(())
        }
    }

    /// Record operation metrics around `fut`.
    async fn observe<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, GvError>>,
    ) -> Result<T, GvError> {
        let started = Instant::now();
        let result = fut.await;
        let status = if result.is_ok() { "success" } else { "error" };
        prom::record_session_operation(operation, status, started.elapsed());

        if let Err(e) = &result {
            prom::record_error(e.error_type_label());
            debug!(
                target: "gv.coordinator",
                operation,
                error_type = e.error_type_label(),
                "Operation rejected"
            );
        }
        result
    }

    async fn timed_save(&self, session: &Session) -> Result<(), GvError> {
        let started = Instant::now();
        let result = self.store.save(session).await;
        prom::record_store_latency("save", started.elapsed());
        Ok(result?)
    }

    async fn timed_load(&self, id: &SessionId) -> Result<Option<Session>, GvError> {
        let started = Instant::now();
        let result = self.store.load(id).await;
        prom::record_store_latency("load", started.elapsed());
        Ok(result?)
    }

    /// Latest committed state from the live actor, or from the store.
    async fn read_session(&self, id: &SessionId) -> Result<Arc<Session>, GvError> {
        if let Some(live) = self.sessions.read().await.get(id) {
            return Ok(live.handle.snapshot());
        }
        self.timed_load(id)
            .await?
            .map(Arc::new)
            .ok_or_else(|| GvError::SessionNotFound(id.to_string()))
    }

    /// Run `op` against the session's actor, spawning it from the store if
    /// needed, and evict the actor once the session has ended.
    async fn with_actor<T, F, Fut>(&self, id: &SessionId, op: F) -> Result<T, GvError>
    where
        F: FnOnce(SessionActorHandle) -> Fut,
        Fut: Future<Output = Result<T, GvError>>,
    {
        self.ensure_accepting()?;
        let handle = self.live_handle(id).await?;
        let result = op(handle.clone()).await;

        let actor_lost = matches!(result, Err(GvError::Internal(_))) && handle.is_closed();
        if handle.snapshot().is_ended() || actor_lost {
            self.evict(&handle).await;
        }
        result
    }

    async fn current_handle(&self, id: &SessionId) -> Option<SessionActorHandle> {
        self.sessions
            .read()
            .await
            .get(id)
            .filter(|live| !live.handle.is_closed())
            .map(|live| live.handle.clone())
    }

    async fn live_handle(&self, id: &SessionId) -> Result<SessionActorHandle, GvError> {
        if let Some(handle) = self.current_handle(id).await {
            return Ok(handle);
        }

        // Concurrent callers for the same id queue here so only one actor is
        // spawned; other sessions never wait on this guard.
        let slot = Arc::clone(self.hydrating.lock().await.entry(*id).or_default());
        let result = {
            let _guard = slot.lock().await;
            self.hydrate(id).await
        };
        drop(slot);

        let mut hydrating = self.hydrating.lock().await;
        if hydrating
            .get(id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            hydrating.remove(id);
        }
        result
    }

    /// Load `id` from the store and spawn its actor. Caller holds the id's
    /// hydration guard.
    async fn hydrate(&self, id: &SessionId) -> Result<SessionActorHandle, GvError> {
        if let Some(handle) = self.current_handle(id).await {
            return Ok(handle);
        }

        let session = self
            .timed_load(id)
            .await?
            .ok_or_else(|| GvError::SessionNotFound(id.to_string()))?;
        if session.is_ended() {
            return Err(GvError::SessionEnded);
        }

        let (handle, task) = SessionActor::spawn(
            session,
            Arc::clone(&self.store),
            self.cancel_token.child_token(),
            Arc::clone(&self.metrics),
            self.config.mailbox_capacity,
        );
        let stale = self.sessions.write().await.insert(
            *id,
            LiveSession {
                handle: handle.clone(),
                task,
            },
        );
        if let Some(stale) = stale {
            self.reap_in_background(*id, stale.task);
        }
        debug!(target: "gv.coordinator", session_id = %id, "Session hydrated from store");
        Ok(handle)
    }

    /// Drop the registry entry for `handle`'s actor, if it is still current.
    async fn evict(&self, handle: &SessionActorHandle) {
        let id = handle.session_id();
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get(&id)
            .is_some_and(|live| live.handle.is_same_actor(handle));
        if !current {
            return;
        }
        if let Some(live) = sessions.remove(&id) {
            debug!(target: "gv.coordinator", session_id = %id, "Session actor evicted");
            self.reap_in_background(id, live.task);
        }
    }

    fn reap_in_background(&self, session_id: SessionId, task: JoinHandle<()>) {
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(
                        target: "gv.coordinator",
                        session_id = %session_id,
                        error = ?e,
                        "Session actor panicked"
                    );
                    metrics.record_panic();
                }
            }
        });
    }

    fn reap(&self, session_id: SessionId, result: Result<(), tokio::task::JoinError>) {
        match result {
            Ok(()) => {
                debug!(target: "gv.coordinator", session_id = %session_id, "Session actor drained");
            }
            Err(e) if e.is_panic() => {
                error!(
                    target: "gv.coordinator",
                    session_id = %session_id,
                    error = ?e,
                    "Session actor panicked during shutdown"
                );
                self.metrics.record_panic();
            }
            Err(_) => {}
        }
    }
}
