//! `SessionActor` - owns one session aggregate.
//!
//! Each mutation is applied to a working copy of the aggregate. The copy is
//! written through the store and only then committed and published on the
//! snapshot channel, so a store failure leaves the visible state untouched.
//!
//! The actor exits when cancelled or when every handle has been dropped.
//! After an end the coordinator drops its handle; requests already holding a
//! clone are still answered (with `SessionEnded`) before the actor exits.

use super::messages::{Reply, SessionMessage};
use super::metrics::{ActorMetrics, MailboxMonitor};
use crate::errors::GvError;
use crate::observability::metrics as prom;
use crate::session::{
    Caller, ControlOutcome, Event, EventOptions, EventType, LeaveOutcome, Participant,
    PlaybackAction, Poll, PollOptions, ReactionKind, Session, SessionUpdate,
};
use crate::store::SessionStore;
use chrono::{DateTime, Utc};
use common::types::{EventId, PollId, SessionId};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Handle to a `SessionActor`.
#[derive(Clone)]
pub struct SessionActorHandle {
    sender: mpsc::Sender<SessionMessage>,
    snapshot: watch::Receiver<Arc<Session>>,
    mailbox: Arc<MailboxMonitor>,
    cancel_token: CancellationToken,
    session_id: SessionId,
}

impl SessionActorHandle {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Latest committed state. Never waits on the mailbox.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Session> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Whether the actor task has stopped receiving messages.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles address the same actor instance.
    #[must_use]
    pub fn is_same_actor(&self, other: &SessionActorHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionMessage,
    ) -> Result<T, GvError> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.record_enqueue();
        if let Err(e) = self.sender.send(build(tx)).await {
            self.mailbox.record_drop();
            return Err(GvError::Internal(format!("channel send failed: {e}")));
        }

        rx.await
            .map_err(|e| GvError::Internal(format!("response receive failed: {e}")))?
    }

    /// Apply `update`. With `caller_id` set, the host check runs in the
    /// same step as the change.
    pub async fn update(
        &self,
        update: SessionUpdate,
        caller_id: Option<String>,
    ) -> Result<Arc<Session>, GvError> {
        self.request(|respond_to| SessionMessage::Update {
            update,
            caller_id,
            respond_to,
        })
        .await
    }

    pub async fn start(&self, caller_id: String) -> Result<Arc<Session>, GvError> {
        self.request(|respond_to| SessionMessage::Start {
            caller_id,
            respond_to,
        })
        .await
    }

    pub async fn end(&self, caller_id: Option<String>) -> Result<(), GvError> {
        self.request(|respond_to| SessionMessage::End {
            caller_id,
            respond_to,
        })
        .await
    }

    pub async fn join(&self, caller: Caller) -> Result<Participant, GvError> {
        self.request(|respond_to| SessionMessage::Join { caller, respond_to })
            .await
    }

    pub async fn leave(&self, user_id: String) -> Result<LeaveOutcome, GvError> {
        self.request(|respond_to| SessionMessage::Leave {
            user_id,
            respond_to,
        })
        .await
    }

    pub async fn request_control(&self, user_id: String) -> Result<ControlOutcome, GvError> {
        self.request(|respond_to| SessionMessage::RequestControl {
            user_id,
            respond_to,
        })
        .await
    }

    pub async fn grant_control(
        &self,
        host_id: String,
        target_id: String,
    ) -> Result<Participant, GvError> {
        self.request(|respond_to| SessionMessage::GrantControl {
            host_id,
            target_id,
            respond_to,
        })
        .await
    }

    pub async fn revoke_control(
        &self,
        host_id: String,
        target_id: String,
    ) -> Result<Participant, GvError> {
        self.request(|respond_to| SessionMessage::RevokeControl {
            host_id,
            target_id,
            respond_to,
        })
        .await
    }

    pub async fn post_event(
        &self,
        author_id: String,
        event_type: EventType,
        content: String,
        options: EventOptions,
    ) -> Result<Event, GvError> {
        self.request(|respond_to| SessionMessage::PostEvent {
            author_id,
            event_type,
            content,
            options,
            respond_to,
        })
        .await
    }

    pub async fn add_reaction(
        &self,
        event_id: EventId,
        user_id: String,
        kind: ReactionKind,
    ) -> Result<Event, GvError> {
        self.request(|respond_to| SessionMessage::AddReaction {
            event_id,
            user_id,
            kind,
            respond_to,
        })
        .await
    }

    pub async fn remove_reaction(
        &self,
        event_id: EventId,
        user_id: String,
        kind: ReactionKind,
    ) -> Result<Event, GvError> {
        self.request(|respond_to| SessionMessage::RemoveReaction {
            event_id,
            user_id,
            kind,
            respond_to,
        })
        .await
    }

    pub async fn issue_control(
        &self,
        user_id: String,
        action: PlaybackAction,
        value: Option<f64>,
    ) -> Result<Event, GvError> {
        self.request(|respond_to| SessionMessage::IssueControl {
            user_id,
            action,
            value,
            respond_to,
        })
        .await
    }

    pub async fn create_poll(
        &self,
        creator_id: String,
        question: String,
        options: Vec<String>,
        poll_options: PollOptions,
    ) -> Result<Poll, GvError> {
        self.request(|respond_to| SessionMessage::CreatePoll {
            creator_id,
            question,
            options,
            poll_options,
            respond_to,
        })
        .await
    }

    pub async fn respond_to_poll(
        &self,
        poll_id: PollId,
        user_id: String,
        user_name: String,
        selected: Vec<usize>,
    ) -> Result<Poll, GvError> {
        self.request(|respond_to| SessionMessage::RespondToPoll {
            poll_id,
            user_id,
            user_name,
            selected,
            respond_to,
        })
        .await
    }
}

/// The `SessionActor` implementation.
pub struct SessionActor {
    session_id: SessionId,
    receiver: mpsc::Receiver<SessionMessage>,
    cancel_token: CancellationToken,
    /// Last committed state.
    state: Arc<Session>,
    snapshot_tx: watch::Sender<Arc<Session>>,
    store: Arc<dyn SessionStore>,
    metrics: Arc<ActorMetrics>,
    mailbox: Arc<MailboxMonitor>,
}

impl SessionActor {
    /// Spawn an actor owning `session`, which must already be persisted.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        session: Session,
        store: Arc<dyn SessionStore>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
        mailbox_capacity: usize,
    ) -> (SessionActorHandle, JoinHandle<()>) {
        let session_id = session.id;
        let (sender, receiver) = mpsc::channel(mailbox_capacity.max(1));
        let state = Arc::new(session);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::clone(&state));
        let mailbox = Arc::new(MailboxMonitor::new(
            session_id.to_string(),
            mailbox_capacity,
        ));

        let actor = Self {
            session_id,
            receiver,
            cancel_token: cancel_token.clone(),
            state,
            snapshot_tx,
            store,
            metrics: Arc::clone(&metrics),
            mailbox: Arc::clone(&mailbox),
        };

        metrics.session_spawned();
        let task_handle = tokio::spawn(actor.run());

        let handle = SessionActorHandle {
            sender,
            snapshot: snapshot_rx,
            mailbox,
            cancel_token,
            session_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "gv.actor.session", fields(session_id = %self.session_id))]
    async fn run(mut self) {
        debug!(target: "gv.actor.session", session_id = %self.session_id, "SessionActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "gv.actor.session",
                        session_id = %self.session_id,
                        "SessionActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_dequeue();
                            self.handle_message(message).await;
                            self.metrics.record_message_processed();
                        }
                        None => {
                            debug!(
                                target: "gv.actor.session",
                                session_id = %self.session_id,
                                "SessionActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.metrics.session_stopped();
        info!(
            target: "gv.actor.session",
            session_id = %self.session_id,
            status = self.state.status.as_str(),
            messages_processed = self.mailbox.messages_processed(),
            "SessionActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Update {
                update,
                caller_id,
                respond_to,
            } => {
                let result = self
                    .mutate(move |s, _| {
                        if let Some(caller_id) = &caller_id {
                            s.ensure_host(caller_id, "update")?;
                        }
                        s.update(update)
                    })
                    .await
                    .map(|()| Arc::clone(&self.state));
                let _ = respond_to.send(result);
            }

            SessionMessage::Start {
                caller_id,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| s.start(&caller_id, now))
                    .await
                    .map(|()| Arc::clone(&self.state));
                let _ = respond_to.send(result);
            }

            SessionMessage::End {
                caller_id,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| {
                        if let Some(caller_id) = &caller_id {
                            s.ensure_host(caller_id, "end")?;
                        }
                        s.end(now)
                    })
                    .await;
                let _ = respond_to.send(result);
            }

            SessionMessage::Join { caller, respond_to } => {
                let result = self.mutate(|s, now| s.join(&caller, now)).await;
                let _ = respond_to.send(result);
            }

            SessionMessage::Leave {
                user_id,
                respond_to,
            } => {
                let result = self.mutate(|s, now| s.leave(&user_id, now)).await;
                let _ = respond_to.send(result);
            }

            SessionMessage::RequestControl {
                user_id,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| s.request_control(&user_id, now))
                    .await;
                let _ = respond_to.send(result);
            }

            SessionMessage::GrantControl {
                host_id,
                target_id,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| s.grant_control(&host_id, &target_id, now))
                    .await;
                let _ = respond_to.send(result);
            }

            SessionMessage::RevokeControl {
                host_id,
                target_id,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| s.revoke_control(&host_id, &target_id, now))
                    .await;
                let _ = respond_to.send(result);
            }

            SessionMessage::PostEvent {
                author_id,
                event_type,
                content,
                options,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| s.post_event(&author_id, event_type, &content, options, now))
                    .await;
                let _ = respond_to.send(result);
            }

            SessionMessage::AddReaction {
                event_id,
                user_id,
                kind,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| s.add_reaction(&event_id, &user_id, kind, now))
                    .await;
                let _ = respond_to.send(result);
            }

            SessionMessage::RemoveReaction {
                event_id,
                user_id,
                kind,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| s.remove_reaction(&event_id, &user_id, kind, now))
                    .await;
                let _ = respond_to.send(result);
            }

            SessionMessage::IssueControl {
                user_id,
                action,
                value,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| s.issue_control(&user_id, action, value, now))
                    .await;
                let _ = respond_to.send(result);
            }

            SessionMessage::CreatePoll {
                creator_id,
                question,
                options,
                poll_options,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| s.create_poll(&creator_id, &question, options, poll_options, now))
                    .await;
                let _ = respond_to.send(result);
            }

            SessionMessage::RespondToPoll {
                poll_id,
                user_id,
                user_name,
                selected,
                respond_to,
            } => {
                let result = self
                    .mutate(|s, now| s.respond_to_poll(&poll_id, &user_id, &user_name, &selected, now))
                    .await;
                let _ = respond_to.send(result);
            }
        }
    }

    /// Apply `apply` to a working copy, persist it, then commit.
    async fn mutate<T>(
        &mut self,
        apply: impl FnOnce(&mut Session, DateTime<Utc>) -> Result<T, GvError>,
    ) -> Result<T, GvError> {
        let now = Utc::now();
        let mut working = Session::clone(&self.state);
        if working.promote_if_due(now) {
            debug!(
                target: "gv.actor.session",
                session_id = %self.session_id,
                "Scheduled session reached its start time"
            );
        }

        let output = apply(&mut working, now)?;

        let started = Instant::now();
        let saved = self.store.save(&working).await;
        prom::record_store_latency("save", started.elapsed());
        if let Err(e) = saved {
            warn!(
                target: "gv.actor.session",
                session_id = %self.session_id,
                error = %e,
                "Store write failed, mutation discarded"
            );
            return Err(e.into());
        }

        self.commit(working);
        Ok(output)
    }

    fn commit(&mut self, session: Session) {
        let ended_now = !self.state.is_ended() && session.is_ended();
        self.state = Arc::new(session);
        self.snapshot_tx.send_replace(Arc::clone(&self.state));

        if ended_now {
            info!(
                target: "gv.actor.session",
                session_id = %self.session_id,
                events = self.state.events.len(),
                participants = self.state.participants.len(),
                "Session ended"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::session::test_support::{instructor, student};
    use crate::session::{CreateSessionOptions, SessionStatus, SettingsOverrides};
    use crate::store::{InMemorySessionStore, StoreError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn new_session() -> Session {
        Session::create(
            "Actor test",
            "vid-1",
            &instructor(),
            &SettingsOverrides::default(),
            CreateSessionOptions::default(),
            Utc::now(),
        )
        .unwrap()
    }

    /// Store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemorySessionStore,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl SessionStore for FlakyStore {
        async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
            self.inner.load(id).await
        }

        async fn save(&self, session: &Session) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("write refused".to_string()));
            }
            self.inner.save(session).await
        }

        async fn list(
            &self,
            filter: &crate::session::SessionFilter,
        ) -> Result<Vec<Session>, StoreError> {
            self.inner.list(filter).await
        }
    }

    fn spawn_with(store: Arc<dyn SessionStore>) -> (SessionActorHandle, JoinHandle<()>) {
        SessionActor::spawn(
            new_session(),
            store,
            CancellationToken::new(),
            ActorMetrics::new(),
            16,
        )
    }

    #[tokio::test]
    async fn test_join_publishes_snapshot_and_persists() {
        let store = Arc::new(InMemorySessionStore::new());
        let (handle, _task) = spawn_with(store.clone());

        let participant = handle.join(student(1)).await.unwrap();
        assert_eq!(participant.user_id, "stu-1");

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.participants.len(), 2);

        let stored = store.load(&handle.session_id()).await.unwrap().unwrap();
        assert_eq!(stored, *snapshot);
    }

    #[tokio::test]
    async fn test_store_failure_leaves_state_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let (handle, _task) = spawn_with(store.clone());
        let before = handle.snapshot();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = handle.join(student(1)).await.unwrap_err();
        assert!(matches!(err, GvError::Store(_)));
        assert!(err.is_retryable());
        assert_eq!(*handle.snapshot(), *before);

        store.fail_writes.store(false, Ordering::SeqCst);
        handle.join(student(1)).await.unwrap();
        assert_eq!(handle.snapshot().participants.len(), 2);
    }

    #[tokio::test]
    async fn test_domain_error_does_not_touch_store() {
        let store = Arc::new(FlakyStore::default());
        let (handle, _task) = spawn_with(store.clone());

        let err = handle.leave("ghost".to_string()).await.unwrap_err();
        assert!(matches!(err, GvError::ParticipantNotFound(_)));
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_messages_after_end_are_rejected() {
        let (handle, _task) = spawn_with(Arc::new(InMemorySessionStore::new()));

        handle.end(None).await.unwrap();
        assert_eq!(handle.snapshot().status, SessionStatus::Ended);

        assert!(matches!(
            handle.join(student(2)).await,
            Err(GvError::SessionEnded)
        ));
        assert!(matches!(handle.end(None).await, Err(GvError::SessionEnded)));
    }

    #[tokio::test]
    async fn test_host_checked_end_and_update_follow_handoff() {
        let (handle, _task) = spawn_with(Arc::new(InMemorySessionStore::new()));
        handle.join(student(1)).await.unwrap();
        handle.leave("inst-1".to_string()).await.unwrap();

        let rename = SessionUpdate {
            name: Some("Taken over".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            handle.update(rename.clone(), Some("inst-1".to_string())).await,
            Err(GvError::NotAuthorized(_))
        ));
        assert!(matches!(
            handle.end(Some("inst-1".to_string())).await,
            Err(GvError::NotAuthorized(_))
        ));
        assert_eq!(handle.snapshot().status, SessionStatus::Active);
        assert_eq!(handle.snapshot().name, "Actor test");

        let updated = handle
            .update(rename, Some("stu-1".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.name, "Taken over");
        handle.end(Some("stu-1".to_string())).await.unwrap();
        assert_eq!(handle.snapshot().status, SessionStatus::Ended);
    }

    #[tokio::test]
    async fn test_mutation_shares_unchanged_events_with_previous_snapshot() {
        let (handle, _task) = spawn_with(Arc::new(InMemorySessionStore::new()));
        let before = handle.snapshot();

        handle
            .post_event(
                "inst-1".to_string(),
                EventType::Chat,
                "hello".to_string(),
                EventOptions::default(),
            )
            .await
            .unwrap();
        let after = handle.snapshot();

        assert_eq!(after.events.len(), before.events.len() + 1);
        assert!(Arc::ptr_eq(&before.events[0], &after.events[0]));
    }

    #[tokio::test]
    async fn test_actor_exits_when_handles_dropped() {
        let (handle, task) = spawn_with(Arc::new(InMemorySessionStore::new()));
        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("actor should exit once its last sender is dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_stops_actor() {
        let (handle, task) = spawn_with(Arc::new(InMemorySessionStore::new()));
        handle.cancel();
        assert!(handle.is_cancelled());

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(handle.is_closed());
        assert!(matches!(
            handle.join(student(1)).await,
            Err(GvError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_joins_are_serialized() {
        let (handle, _task) = spawn_with(Arc::new(InMemorySessionStore::new()));

        let joins = (0..10).map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.join(student(7)).await })
        });
        for join in joins.collect::<Vec<_>>() {
            join.await.unwrap().unwrap();
        }

        let snapshot = handle.snapshot();
        assert_eq!(
            snapshot
                .participants
                .iter()
                .filter(|p| p.user_id == "stu-7")
                .count(),
            1
        );
    }
}
