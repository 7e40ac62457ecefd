//! Group Viewing Service Library
//!
//! Coordinates synchronized group viewing sessions: a named, host-owned room
//! in which participants watch the same video, exchange chat, questions and
//! reactions, run polls, and share authority over playback.
//!
//! # Architecture
//!
//! ```text
//! HTTP (axum) ──> Coordinator ──> SessionActor (one per live session)
//!                     │               ├── owns the Session aggregate
//!                     │               └── write-through to SessionStore
//!                     └── hydrates ended/evicted sessions from SessionStore
//! ```
//!
//! The domain rules live on [`session::Session`] as plain synchronous
//! methods taking an explicit `now`; actors only serialize access to them.
//!
//! # Modules
//!
//! - [`session`] - session aggregate and its rules
//! - [`actors`] - per-session actor, mailbox messages and metrics
//! - [`coordinator`] - routes operations to actors
//! - [`store`] - persistence seam (in-memory, Redis)
//! - [`handlers`], [`routes`], [`middleware`], [`models`] - HTTP boundary
//! - [`config`] - service configuration from environment
//! - [`errors`] - error type and HTTP mapping
//! - [`observability`] - metrics and health endpoints

pub mod actors;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod session;
pub mod store;
