//! Callers and coordinators with fixed, readable identities.

use gv_service::coordinator::{Coordinator, CoordinatorConfig};
use gv_service::session::{Caller, CreateSessionOptions, Role, Session, SettingsOverrides};
use gv_service::store::{InMemorySessionStore, SessionStore};
use std::sync::Arc;

pub const TEST_VIDEO_ID: &str = "vid-intro-01";

/// Instructor `inst-1` ("Dr. Rivera").
pub fn instructor() -> Caller {
    Caller::new("inst-1", "Dr. Rivera", Role::Instructor)
}

/// Admin `admin-1` ("Ops Admin").
pub fn admin() -> Caller {
    Caller::new("admin-1", "Ops Admin", Role::Admin)
}

/// Student `stu-{n}` ("Student {n}").
pub fn student(n: u32) -> Caller {
    Caller::new(format!("stu-{n}"), format!("Student {n}"), Role::Student)
}

/// Coordinator over a fresh in-memory store.
pub fn coordinator() -> Coordinator {
    coordinator_with_store(InMemorySessionStore::new())
}

pub fn coordinator_with_store(store: impl SessionStore + 'static) -> Coordinator {
    Coordinator::new(Arc::new(store), CoordinatorConfig::default())
}

/// Create an active session for `TEST_VIDEO_ID` hosted by `host`.
pub async fn create_session(coordinator: &Coordinator, host: Caller) -> Session {
    create_session_with(coordinator, host, SettingsOverrides::default()).await
}

pub async fn create_session_with(
    coordinator: &Coordinator,
    host: Caller,
    settings: SettingsOverrides,
) -> Session {
    let name = format!("{}'s session", host.user_name);
    coordinator
        .create_session(
            &name,
            TEST_VIDEO_ID,
            host,
            settings,
            CreateSessionOptions::default(),
        )
        .await
        .expect("session creation should succeed")
}
