//! Session management for exploration threads.
//!
//! This module provides in-memory session storage for tracking one
//! exploration conversation per session. Sessions are identified by UUID and
//! carry the current location plus a bounded instruction history.
//!
//! # Architecture
//!
//! - [`Session`]: a single exploration thread
//! - [`SessionStore`]: thread-safe store for all live sessions
//!
//! # Example
//!
//! ```rust
//! use wayfind::session::SessionStore;
//!
//! let store = SessionStore::new();
//! let session = store.create(Some("Paris".to_string()), None);
//! assert_eq!(session.location().as_deref(), Some("Paris"));
//! ```

mod store;

pub use store::{HistoryEntry, Session, SessionStore};
