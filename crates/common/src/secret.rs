//! Secret types for values that must never reach logs.
//!
//! Re-exports [`secrecy`] so every crate uses the same wrapper. `SecretString`
//! redacts itself in `Debug`, so a config struct holding a store URL with
//! embedded credentials can derive or hand-write `Debug` safely.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let url = SecretString::from("redis://:hunter2@cache:6379");
//! assert!(!format!("{url:?}").contains("hunter2"));
//! assert_eq!(url.expose_secret(), "redis://:hunter2@cache:6379");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
