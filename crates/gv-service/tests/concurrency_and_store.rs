//! Concurrency, persistence and failure handling of the coordinator.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::types::SessionId;
use gv_service::coordinator::{Coordinator, CoordinatorConfig};
use gv_service::errors::GvError;
use gv_service::session::{EventOptions, EventType};
use gv_service::store::SessionStore;
use gv_test_utils::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_concurrent_joins_produce_one_entry_per_identity() {
    let coordinator = Arc::new(coordinator());
    let session = create_session(&coordinator, instructor()).await;

    let mut tasks = Vec::new();
    for n in 0..50u32 {
        let coordinator = Arc::clone(&coordinator);
        let id = session.id;
        // Every identity joins twice at once
        tasks.push(tokio::spawn(async move {
            coordinator.join(&id, student(n % 25)).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let snapshot = coordinator.get_session(&session.id).await.unwrap();
    assert_eq!(snapshot.participants.len(), 26);
    let unique: HashSet<&str> = snapshot
        .participants
        .iter()
        .map(|p| p.user_id.as_str())
        .collect();
    assert_eq!(unique.len(), 26);
}

#[tokio::test]
async fn test_concurrent_posts_keep_sequences_dense() {
    let coordinator = Arc::new(coordinator());
    let session = create_session(&coordinator, instructor()).await;
    for n in 0..5 {
        coordinator.join(&session.id, student(n)).await.unwrap();
    }

    let mut tasks = Vec::new();
    for n in 0..5u32 {
        for i in 0..10 {
            let coordinator = Arc::clone(&coordinator);
            let id = session.id;
            tasks.push(tokio::spawn(async move {
                coordinator
                    .post_event(
                        &id,
                        &format!("stu-{n}"),
                        EventType::Chat,
                        &format!("message {i}"),
                        EventOptions::default(),
                    )
                    .await
            }));
        }
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let events = coordinator.events_since(&session.id, 0).await.unwrap();
    // created + 5 joins + 50 chats
    assert_eq!(events.len(), 56);
    for (index, event) in events.iter().enumerate() {
        assert_eq!(event.sequence, index as u64 + 1);
    }
    assert!(events.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let coordinator = Arc::new(coordinator());
    let first = create_session(&coordinator, instructor()).await;
    let second = create_session(&coordinator, admin()).await;

    coordinator.end_session(&first.id).await.unwrap();

    coordinator.join(&second.id, student(1)).await.unwrap();
    let snapshot = coordinator.get_session(&second.id).await.unwrap();
    assert_eq!(snapshot.active_participant_count(), 2);
}

#[tokio::test]
async fn test_store_failure_leaves_state_unchanged() {
    let store = FailingStore::new();
    let coordinator = coordinator_with_store(store.clone());
    let session = create_session(&coordinator, instructor()).await;
    let before = coordinator.get_session(&session.id).await.unwrap();

    store.fail_saves(true);
    let result = coordinator.join(&session.id, student(1)).await;
    assert!(matches!(result, Err(GvError::Store(_))));
    assert!(result.unwrap_err().is_retryable());

    let after = coordinator.get_session(&session.id).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(
        store.inner().load(&session.id).await.unwrap(),
        Some(before.clone())
    );

    // Recovery: the same request succeeds once the store is back
    store.fail_saves(false);
    coordinator.join(&session.id, student(1)).await.unwrap();
    let recovered = coordinator.get_session(&session.id).await.unwrap();
    assert_eq!(recovered.participants.len(), 2);
    assert_eq!(recovered.last_sequence, before.last_sequence + 1);
}

#[tokio::test]
async fn test_store_failure_on_create_is_reported() {
    let store = FailingStore::new();
    store.fail_saves(true);
    let coordinator = coordinator_with_store(store.clone());

    let result = coordinator
        .create_session(
            "Doomed",
            TEST_VIDEO_ID,
            instructor(),
            Default::default(),
            Default::default(),
        )
        .await;
    assert!(matches!(result, Err(GvError::Store(_))));
    assert_eq!(coordinator.live_session_count().await, 0);
    assert!(store.inner().is_empty().await);
}

#[tokio::test]
async fn test_list_failure_is_store_error() {
    let store = FailingStore::new();
    let coordinator = coordinator_with_store(store.clone());
    create_session(&coordinator, instructor()).await;

    store.fail_lists(true);
    assert!(matches!(
        coordinator.list_sessions(&Default::default()).await,
        Err(GvError::Store(_))
    ));
}

#[tokio::test]
async fn test_live_reads_do_not_touch_store() {
    let store = CountingStore::new();
    let coordinator = coordinator_with_store(store.clone());
    let session = create_session(&coordinator, instructor()).await;
    assert_eq!(store.saves(), 1);

    for _ in 0..5 {
        coordinator.get_session(&session.id).await.unwrap();
        coordinator.events_since(&session.id, 0).await.unwrap();
    }
    assert_eq!(store.loads(), 0);

    coordinator.join(&session.id, student(1)).await.unwrap();
    assert_eq!(store.saves(), 2);
}

#[tokio::test]
async fn test_rejected_mutations_are_not_persisted() {
    let store = CountingStore::new();
    let coordinator = coordinator_with_store(store.clone());
    let session = create_session(&coordinator, instructor()).await;

    let result = coordinator
        .post_event(
            &session.id,
            "stranger",
            EventType::Chat,
            "hi",
            EventOptions::default(),
        )
        .await;
    assert!(matches!(result, Err(GvError::NotAuthorized(_))));
    assert_eq!(store.saves(), 1);
}

#[tokio::test]
async fn test_restart_hydrates_once_and_rejects_ended() {
    let store = Arc::new(CountingStore::new());
    let first = Coordinator::new(store.clone(), CoordinatorConfig::default());
    let live = create_session(&first, instructor()).await;
    let ended = create_session(&first, instructor()).await;
    first.end_session(&ended.id).await.unwrap();
    first.shutdown(Duration::from_secs(1)).await;

    let second = Arc::new(Coordinator::new(store.clone(), CoordinatorConfig::default()));
    let loads_before = store.loads();

    let mut tasks = Vec::new();
    for n in 0..10 {
        let coordinator = Arc::clone(&second);
        let id = live.id;
        tasks.push(tokio::spawn(async move { coordinator.join(&id, student(n)).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(second.live_session_count().await, 1);
    // One hydration for ten concurrent callers
    assert_eq!(store.loads() - loads_before, 1);

    assert!(matches!(
        second.join(&ended.id, student(1)).await,
        Err(GvError::SessionEnded)
    ));
    assert_eq!(second.live_session_count().await, 1);
}

#[tokio::test]
async fn test_shutdown_drains_and_rejects() {
    let coordinator = coordinator();
    let session = create_session(&coordinator, instructor()).await;
    coordinator.join(&session.id, student(1)).await.unwrap();

    coordinator.shutdown(Duration::from_secs(1)).await;
    assert_eq!(coordinator.live_session_count().await, 0);
    assert!(matches!(
        coordinator.leave(&session.id, "stu-1").await,
        Err(GvError::Draining)
    ));

    // Committed state survived in the store
    let stored = coordinator.get_session(&session.id).await.unwrap();
    assert_eq!(stored.participants.len(), 2);
}

#[tokio::test]
async fn test_slow_load_does_not_block_live_sessions() {
    let store = FailingStore::new();
    let coordinator = Arc::new(coordinator_with_store(store.clone()));
    let live = create_session(&coordinator, instructor()).await;

    store.delay_loads(Duration::from_millis(800));
    let pending = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.join(&SessionId::new(), student(9)).await })
    };
    // Let the unknown id reach the store
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    coordinator.join(&live.id, student(1)).await.unwrap();
    assert!(
        started.elapsed() < Duration::from_millis(300),
        "join on a live session waited {:?} behind another id's load",
        started.elapsed()
    );

    assert!(matches!(
        pending.await.unwrap(),
        Err(GvError::SessionNotFound(_))
    ));
}
