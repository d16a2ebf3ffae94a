use serde::{Deserialize, Serialize};

use super::GenerationError;

/// Decoding parameters sent with every generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub max_tokens: u32,
    /// Fixed seed for reproducible runs. `None` lets the server choose.
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_k: 200,
            top_p: 0.6,
            repetition_penalty: 1.1,
            max_tokens: 2048,
            seed: Some(30),
        }
    }
}

/// One generation result. Backends with constrained decoding return
/// `Structured`; free-text backends return `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutput {
    Text(String),
    Structured(serde_json::Value),
}

/// Batch text generation.
///
/// Returns one output per prompt, in prompt order. An `Err` means the whole
/// batch failed and may be retried. A backend that returns fewer outputs
/// than prompts leaves the trailing prompts unanswered.
pub trait Generator {
    fn generate(
        &self,
        prompts: &[String],
        sampling: &SamplingConfig,
    ) -> Result<Vec<GenerationOutput>, GenerationError>;

    /// Called once before the first batch of a run that has work to do.
    fn ensure_ready(&self) -> Result<(), GenerationError> {
        Ok(())
    }
}
