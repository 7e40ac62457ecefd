//! # Group Viewing Test Utilities
//!
//! Shared mocks and fixtures for gv-service integration tests.
//!
//! - `stores` - `FailingStore` and `CountingStore` test doubles
//! - `fixtures` - callers with fixed identities and a ready-made coordinator
//! - `http` - request builders and response decoding for router tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gv_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let store = FailingStore::new();
//!     let coordinator = coordinator_with_store(store.clone());
//!
//!     let session = create_session(&coordinator, instructor()).await;
//!     store.fail_saves(true);
//!     assert!(coordinator.join(&session.id, student(1)).await.is_err());
//! }
//! ```

pub mod fixtures;
pub mod http;
pub mod stores;

pub use fixtures::*;
pub use http::*;
pub use stores::*;
