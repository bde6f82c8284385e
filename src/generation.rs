//! Generation request and result values exchanged with the bridge.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// A validated prompt.
///
/// The maximum-token bound is not part of the request; it is fixed when the
/// model is loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
}

impl GenerationRequest {
    /// Rejects prompts that are empty or whitespace-only.
    pub fn new(prompt: impl Into<String>) -> Result<Self, BridgeError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(BridgeError::invalid_input("Prompt must not be empty"));
        }
        Ok(Self { prompt })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn into_prompt(self) -> String {
        self.prompt
    }
}

impl std::fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GenerationRequest {{ prompt_len: {} }}", self.prompt.len())
    }
}

/// Generated text and the wall-clock time the engine spent on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub text: String,
    pub inference_time_ms: u64,
}
