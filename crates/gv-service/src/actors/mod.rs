//! Per-session actors.
//!
//! Each live session is owned by one [`SessionActor`] task. Mutations are
//! messages on its bounded mailbox and are applied one at a time, so sessions
//! never share locks and a session's state is never mutated concurrently.
//! Reads go to the snapshot the actor publishes after every commit.

pub mod messages;
pub mod metrics;
pub mod session;

pub use messages::SessionMessage;
pub use metrics::{ActorMetrics, MailboxLevel, MailboxMonitor};
pub use session::{SessionActor, SessionActorHandle};
