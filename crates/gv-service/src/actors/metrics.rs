//! Actor metrics and mailbox monitoring.
//!
//! Mailbox thresholds scale with the configured capacity:
//!
//! | Level    | Depth                      |
//! |----------|----------------------------|
//! | Normal   | <= 20% of capacity         |
//! | Warning  | 20% - 80% of capacity      |
//! | Critical | > 80% of capacity          |

use crate::observability::metrics as prom;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks queue depth of one session mailbox.
///
/// Shared between the handle (which enqueues) and the actor (which dequeues).
#[derive(Debug)]
pub struct MailboxMonitor {
    session_id: String,
    normal_threshold: usize,
    warning_threshold: usize,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
    messages_dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(session_id: impl Into<String>, capacity: usize) -> Self {
        Self {
            session_id: session_id.into(),
            normal_threshold: capacity / 5,
            warning_threshold: capacity.saturating_mul(4) / 5,
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    /// Record a message about to be sent to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);

        let level = self.level_for_depth(new_depth);
        if level == MailboxLevel::Critical {
            warn!(
                target: "gv.actor.mailbox",
                session_id = %self.session_id,
                depth = new_depth,
                threshold = self.warning_threshold,
                "Mailbox depth critical"
            );
        } else if level == MailboxLevel::Warning && new_depth == self.normal_threshold + 1 {
            // Log once when crossing into the warning band
            debug!(
                target: "gv.actor.mailbox",
                session_id = %self.session_id,
                depth = new_depth,
                "Mailbox depth elevated"
            );
        }
    }

    /// Record a message taken off the mailbox by the actor.
    pub fn record_dequeue(&self) {
        let previous = self.decrement();
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        prom::record_mailbox_depth(previous);
    }

    /// Record a message that never reached the actor (mailbox closed).
    pub fn record_drop(&self) {
        self.decrement();
        let dropped = self.messages_dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            target: "gv.actor.mailbox",
            session_id = %self.session_id,
            dropped,
            "Message dropped, session mailbox closed"
        );
    }

    fn decrement(&self) -> usize {
        self.depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            })
            .unwrap_or(0)
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        self.level_for_depth(self.current_depth())
    }

    fn level_for_depth(&self, depth: usize) -> MailboxLevel {
        if depth > self.warning_threshold {
            MailboxLevel::Critical
        } else if depth > self.normal_threshold {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Aggregated metrics for all session actors on this instance.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    active_sessions: AtomicUsize,
    actor_panics: AtomicU64,
    total_messages_processed: AtomicU64,
}

impl ActorMetrics {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn session_spawned(&self) {
        let count = self.active_sessions.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_sessions_active(count);
    }

    pub fn session_stopped(&self) {
        let previous = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(c.saturating_sub(1))
            })
            .unwrap_or(0);
        prom::set_sessions_active(previous.saturating_sub(1));
    }

    /// Record an actor task that ended in a panic.
    pub fn record_panic(&self) {
        let total = self.actor_panics.fetch_add(1, Ordering::Relaxed) + 1;
        prom::record_actor_panic();
        tracing::error!(
            target: "gv.actor.panic",
            total_panics = total,
            "Session actor panicked"
        );
    }

    pub fn record_message_processed(&self) {
        self.total_messages_processed
            .fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn panic_count(&self) -> u64 {
        self.actor_panics.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.total_messages_processed.load(Ordering::Relaxed)
    }
}
