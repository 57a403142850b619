//! HTTP client for the chat-completion generation backend.

use serde_json::json;

use super::validate::validate_candidate;
use super::{GenerateError, GeneratorSettings, Instruction, InstructionSource};

/// System prompt template shipped with the binary. Treated as an opaque
/// asset; its contents are a contract with the model, not with this code.
const PROMPT_TEMPLATE: &str = include_str!("../../prompts/exploration.md");

/// How many prior instructions are serialized into the continuity message.
const CONTEXT_WINDOW: usize = 3;

/// Production [`InstructionSource`] backed by a chat-completion endpoint.
///
/// Performs exactly one request per call; there is no internal retry, so a
/// transient backend failure surfaces immediately to the caller.
pub struct InstructionGenerator {
    http: reqwest::Client,
    settings: GeneratorSettings,
}

impl std::fmt::Debug for InstructionGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionGenerator")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .finish()
    }
}

impl InstructionGenerator {
    /// Create a new generator with the given settings.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(settings: GeneratorSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { http, settings })
    }

    fn build_messages(&self, location: &str, recent: &[Instruction]) -> Vec<serde_json::Value> {
        let mut messages = vec![json!({
            "role": "system",
            "content": format!(
                "{PROMPT_TEMPLATE}\n\nIMPORTANT: You must respond with valid JSON only, no additional text or markdown formatting."
            ),
        })];

        if !recent.is_empty() {
            let tail = &recent[recent.len().saturating_sub(CONTEXT_WINDOW)..];
            let context = serde_json::to_string(tail).unwrap_or_default();
            messages.push(json!({
                "role": "system",
                "content": format!("Previous exploration context: {context}"),
            }));
        }

        messages.push(json!({
            "role": "user",
            "content": location,
        }));

        messages
    }
}

#[async_trait::async_trait]
impl InstructionSource for InstructionGenerator {
    async fn generate(
        &self,
        location: &str,
        recent: &[Instruction],
    ) -> Result<Instruction, GenerateError> {
        let body = json!({
            "model": self.settings.model,
            "messages": self.build_messages(location, recent),
            "temperature": 0.8,
            "response_format": { "type": "json_object" },
        });

        let resp = self
            .http
            .post(&self.settings.base_url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerateError::Unavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(GenerateError::Unavailable(format!(
                "backend returned {status}: {detail}"
            )));
        }

        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| GenerateError::Unavailable(format!("unreadable response body: {e}")))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                GenerateError::Unavailable("response missing choices[0].message.content".to_string())
            })?;

        let candidate: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| GenerateError::Unavailable(format!("content is not valid JSON: {e}")))?;

        // Shape violations are the model's fault, not the backend's: a
        // well-formed JSON document that is not an instruction is Invalid.
        let instruction = validate_candidate(&candidate).map_err(GenerateError::Invalid)?;

        tracing::debug!(
            location = %location,
            choices = instruction.choices.len(),
            "Generated instruction"
        );

        Ok(instruction)
    }
}
