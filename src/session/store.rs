//! Exploration session records and their thread-safe store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generator::Instruction;

/// Maximum number of history entries kept per session; older entries are
/// trimmed from the front.
const MAX_HISTORY: usize = 10;

/// One generated instruction plus the moment it was appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the instruction was appended to the session.
    pub timestamp: DateTime<Utc>,
    /// The validated instruction.
    pub instruction: Instruction,
}

/// A single exploration session.
///
/// Sessions hand out cheap clones sharing one record; reading or mutating a
/// session through the store touches its `last_accessed` timestamp, which
/// drives expiry.
#[derive(Debug)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Unique session identifier (UUID-v4), immutable.
    id: String,
    /// Session creation time, immutable.
    created_at: DateTime<Utc>,
    /// Last read or mutation time.
    last_accessed: RwLock<DateTime<Utc>>,
    /// Current location, unset until first provided.
    location: RwLock<Option<String>>,
    /// Bounded instruction history, oldest first.
    history: RwLock<Vec<HistoryEntry>>,
    /// Caller-supplied bag, never interpreted here.
    metadata: serde_json::Value,
}

impl Clone for Session {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Session {
    fn new(location: Option<String>, metadata: Option<serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4().to_string(),
                created_at: now,
                last_accessed: RwLock::new(now),
                location: RwLock::new(location),
                history: RwLock::new(Vec::new()),
                metadata: metadata.unwrap_or(serde_json::Value::Null),
            }),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Get the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// Get the last access timestamp.
    #[must_use]
    pub fn last_accessed(&self) -> DateTime<Utc> {
        *self.inner.last_accessed.read().unwrap()
    }

    /// Get the current location, if any has been set.
    #[must_use]
    pub fn location(&self) -> Option<String> {
        self.inner.location.read().unwrap().clone()
    }

    /// Get the caller-supplied metadata.
    #[must_use]
    pub fn metadata(&self) -> serde_json::Value {
        self.inner.metadata.clone()
    }

    /// Replace the session's location and touch it.
    pub fn set_location(&self, location: impl Into<String>) {
        let mut guard = self.inner.location.write().unwrap();
        *guard = Some(location.into());
        drop(guard);
        self.touch();
    }

    /// Append a generated instruction, trimming the history past
    /// [`MAX_HISTORY`], and touch the session.
    pub fn push_instruction(&self, instruction: Instruction) {
        let mut guard = self.inner.history.write().unwrap();
        guard.push(HistoryEntry {
            timestamp: Utc::now(),
            instruction,
        });
        if guard.len() > MAX_HISTORY {
            let excess = guard.len() - MAX_HISTORY;
            guard.drain(..excess);
        }
        drop(guard);
        self.touch();
    }

    /// Get the full history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.history.read().unwrap().clone()
    }

    /// Get up to the `n` most recent instructions, oldest first.
    #[must_use]
    pub fn recent_instructions(&self, n: usize) -> Vec<Instruction> {
        let guard = self.inner.history.read().unwrap();
        let start = guard.len().saturating_sub(n);
        guard[start..].iter().map(|e| e.instruction.clone()).collect()
    }

    /// Get the number of instructions in the history.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.inner.history.read().unwrap().len()
    }

    /// Update the last access timestamp.
    pub(crate) fn touch(&self) {
        let mut guard = self.inner.last_accessed.write().unwrap();
        *guard = Utc::now();
    }

    /// Check whether the session has been idle for at least `timeout`.
    #[must_use]
    pub fn is_expired(&self, timeout: Duration) -> bool {
        let last = *self.inner.last_accessed.read().unwrap();
        let now = Utc::now();
        if let Ok(idle) = (now - last).to_std() {
            idle >= timeout
        } else {
            // Negative duration means clock skew or "last" is in the future.
            false
        }
    }
}

/// Thread-safe store for sessions.
///
/// The store exclusively owns all session records; callers receive live
/// handles whose reads and mutations touch `last_accessed` as a side effect.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug)]
struct SessionStoreInner {
    sessions: RwLock<HashMap<String, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// Create a new session store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Create a new session with a freshly minted id and return it.
    ///
    /// Ids are always minted here; callers cannot register an id of their
    /// own, which keeps ids unique across the store for a session's
    /// lifetime.
    #[must_use]
    pub fn create(
        &self,
        location: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Session {
        let session = Session::new(location, metadata);
        let mut guard = self.inner.sessions.write().unwrap();
        guard.insert(session.id().to_string(), session.clone());
        drop(guard);
        tracing::debug!(session_id = %session.id(), "Created session");
        session
    }

    /// Get a session by id, touching it on hit.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        let guard = self.inner.sessions.read().unwrap();
        let session = guard.get(id).cloned();
        drop(guard);
        if let Some(s) = &session {
            s.touch();
        }
        session
    }

    /// Update a session's location, touching it. Returns the session, or
    /// `None` if the id is unknown.
    #[must_use]
    pub fn update_location(&self, id: &str, location: impl Into<String>) -> Option<Session> {
        let session = self.get(id)?;
        session.set_location(location);
        Some(session)
    }

    /// Append an instruction to a session's history, touching it. Returns
    /// the session, or `None` if the id is unknown.
    #[must_use]
    pub fn append_instruction(&self, id: &str, instruction: Instruction) -> Option<Session> {
        let session = self.get(id)?;
        session.push_instruction(instruction);
        Some(session)
    }

    /// Remove a session by id. Returns whether anything was removed;
    /// removing an unknown id is a silent no-op.
    pub fn remove(&self, id: &str) -> bool {
        let mut guard = self.inner.sessions.write().unwrap();
        guard.remove(id).is_some()
    }

    /// Snapshot of all live sessions.
    #[must_use]
    pub fn list_all(&self) -> Vec<Session> {
        self.inner
            .sessions
            .read()
            .unwrap()
            .values()
            .cloned()
            .collect()
    }

    /// Get the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.sessions.read().unwrap().len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove sessions that have been idle for at least `timeout`.
    ///
    /// Returns the number of sessions removed.
    pub fn sweep_expired(&self, timeout: Duration) -> usize {
        let mut guard = self.inner.sessions.write().unwrap();
        let before = guard.len();
        guard.retain(|_, session| !session.is_expired(timeout));
        let removed = before - guard.len();
        drop(guard);
        if removed > 0 {
            tracing::info!(removed, "Swept expired sessions");
        }
        removed
    }
}
