//! Instruction generation against a remote chat-completion backend.
//!
//! # Overview
//!
//! The [`InstructionSource`] trait defines the generation seam: given a
//! location and the recent instruction history, produce one validated
//! [`Instruction`]. The production implementation is
//! [`InstructionGenerator`], which assembles a prompt, makes a single HTTP
//! call to the configured backend, parses the JSON payload, and runs the
//! result through the [`validate`] checks before handing it back.
//!
//! Callers must be able to tell backend trouble apart from a backend that
//! answered but produced garbage; [`GenerateError`] keeps the two distinct.

pub mod client;
pub mod validate;

pub use client::InstructionGenerator;

use serde::{Deserialize, Serialize};

/// A generated exploration instruction: one question, multiple choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// The question posed to the explorer.
    pub question: String,
    /// Possible answers, each with a follow-up action.
    pub choices: Vec<Choice>,
}

/// A single answer option within an [`Instruction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Short answer text.
    pub option: String,
    /// What the explorer should do next if they pick this option.
    pub next_action: String,
}

/// Connection and model settings for the generation backend.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Endpoint URL the chat request is POSTed to.
    pub base_url: String,
    /// Bearer token for the backend.
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Upper bound on the outbound call, in seconds.
    pub timeout_secs: u64,
}

/// Errors produced while generating an instruction.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Transport failure, non-success status, or an unparseable response.
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered, but the content failed structural validation.
    #[error("invalid instruction: {0}")]
    Invalid(String),
}

/// Source of exploration instructions.
///
/// Production code uses [`InstructionGenerator`]; tests substitute a mock so
/// the pipeline can be exercised without a live backend.
#[async_trait::async_trait]
pub trait InstructionSource: Send + Sync {
    /// Generate one instruction for `location`, given the most recent
    /// instructions from the session for continuity.
    ///
    /// # Errors
    ///
    /// [`GenerateError::Unavailable`] if the backend cannot be reached or
    /// returns an unusable response; [`GenerateError::Invalid`] if the
    /// generated content fails validation.
    async fn generate(
        &self,
        location: &str,
        recent: &[Instruction],
    ) -> Result<Instruction, GenerateError>;
}
