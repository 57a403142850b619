//! Request pipeline: orchestrates the session store and the instruction
//! generator for each endpoint.
//!
//! Handlers validate the raw request shape at the boundary and then call
//! into [`ExplorationService`]; everything here speaks [`ApiError`] so the
//! translation to HTTP happens exactly once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::generator::{Instruction, InstructionSource};
use crate::session::{HistoryEntry, Session, SessionStore};

/// Response payload for session creation.
#[derive(Debug, Serialize)]
pub struct CreatedSession {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub location: Option<String>,
}

/// Response payload for an instruction fetch.
#[derive(Debug, Serialize)]
pub struct InstructionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub location: String,
    pub instruction: Instruction,
    pub timestamp: DateTime<Utc>,
}

/// Full session detail, history included.
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub location: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastAccessed")]
    pub last_accessed: DateTime<Utc>,
    #[serde(rename = "instructionCount")]
    pub instruction_count: usize,
    #[serde(rename = "previousInstructions")]
    pub previous_instructions: Vec<HistoryEntry>,
}

/// Per-session summary used by the listing endpoint (no history).
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub location: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastAccessed")]
    pub last_accessed: DateTime<Utc>,
    #[serde(rename = "instructionCount")]
    pub instruction_count: usize,
}

/// Response payload for the session listing.
#[derive(Debug, Serialize)]
pub struct SessionList {
    pub sessions: Vec<SessionSummary>,
    pub total: usize,
}

/// Orchestrates session state and instruction generation.
///
/// Owns the [`SessionStore`] and the generation seam; handlers hold this
/// behind the shared application state.
pub struct ExplorationService {
    sessions: SessionStore,
    source: Arc<dyn InstructionSource>,
}

impl std::fmt::Debug for ExplorationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorationService")
            .field("sessions", &self.sessions)
            .finish()
    }
}

impl ExplorationService {
    /// Create a service over the given store and instruction source.
    #[must_use]
    pub fn new(sessions: SessionStore, source: Arc<dyn InstructionSource>) -> Self {
        Self { sessions, source }
    }

    /// Access the underlying session store (sweep task, tests).
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Create a session with the given location and metadata.
    pub fn create_session(
        &self,
        location: String,
        metadata: Option<serde_json::Value>,
    ) -> CreatedSession {
        let session = self.sessions.create(Some(location), metadata);
        CreatedSession {
            session_id: session.id().to_string(),
            created_at: session.created_at(),
            location: session.location(),
        }
    }

    /// Fetch a fresh instruction for a session.
    ///
    /// An unknown `session_id` creates a new session on the fly; the store
    /// always mints a fresh id, so the returned `sessionId` can differ from
    /// the one requested. The effective location is the query override if
    /// given, otherwise the session's stored location; a differing override
    /// is written back to the session before generation.
    ///
    /// The generation call runs without any store lock held: location and
    /// recent history are snapshotted first, and the result is appended
    /// afterwards. If the session is deleted while the call is in flight the
    /// append fails with `SessionNotFound`.
    ///
    /// # Errors
    ///
    /// `MissingLocation` when neither the query nor the session has a
    /// location; generator errors pass through with their kind preserved.
    pub async fn fetch_instruction(
        &self,
        session_id: &str,
        location_override: Option<String>,
    ) -> Result<InstructionResponse, ApiError> {
        let session = if let Some(session) = self.sessions.get(session_id) {
            session
        } else {
            let session = self.sessions.create(location_override.clone(), None);
            tracing::info!(
                requested_id = %session_id,
                session_id = %session.id(),
                "Unknown session id, created a new session"
            );
            session
        };

        let location = location_override
            .clone()
            .or_else(|| session.location())
            .ok_or(ApiError::MissingLocation)?;

        if let Some(wanted) = location_override
            && session.location().as_deref() != Some(&wanted)
        {
            let _ = self
                .sessions
                .update_location(session.id(), wanted)
                .ok_or_else(|| ApiError::SessionNotFound(session.id().to_string()))?;
        }

        // Snapshot before calling out; the backend round trip must not pin
        // the store.
        let recent = session.recent_instructions(3);
        let session_id = session.id().to_string();

        let instruction = self.source.generate(&location, &recent).await?;

        let _ = self
            .sessions
            .append_instruction(&session_id, instruction.clone())
            .ok_or_else(|| ApiError::SessionNotFound(session_id.clone()))?;

        tracing::info!(
            session_id = %session_id,
            location = %location,
            "Instruction generated and appended"
        );

        Ok(InstructionResponse {
            session_id,
            location,
            instruction,
            timestamp: Utc::now(),
        })
    }

    /// Full detail for one session.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` if the id is unknown.
    pub fn session_detail(&self, session_id: &str) -> Result<SessionDetail, ApiError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| ApiError::SessionNotFound(session_id.to_string()))?;
        Ok(detail_of(&session))
    }

    /// Delete one session.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` if nothing was removed.
    pub fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        if self.sessions.remove(session_id) {
            Ok(())
        } else {
            Err(ApiError::SessionNotFound(session_id.to_string()))
        }
    }

    /// Summaries of all live sessions.
    #[must_use]
    pub fn list_sessions(&self) -> SessionList {
        let sessions: Vec<SessionSummary> = self
            .sessions
            .list_all()
            .iter()
            .map(|session| SessionSummary {
                session_id: session.id().to_string(),
                location: session.location(),
                created_at: session.created_at(),
                last_accessed: session.last_accessed(),
                instruction_count: session.instruction_count(),
            })
            .collect();
        let total = sessions.len();
        SessionList { sessions, total }
    }
}

fn detail_of(session: &Session) -> SessionDetail {
    SessionDetail {
        session_id: session.id().to_string(),
        location: session.location(),
        created_at: session.created_at(),
        last_accessed: session.last_accessed(),
        instruction_count: session.instruction_count(),
        previous_instructions: session.history(),
    }
}
