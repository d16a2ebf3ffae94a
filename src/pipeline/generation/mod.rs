//! Language-model generation boundary.
//!
//! The batch orchestrator only sees the [`Generator`] trait. The Ollama
//! client is one implementation; tests use in-memory mocks.

pub mod ollama;
pub mod sanitize;
pub mod types;

pub use ollama::OllamaGenerator;
pub use sanitize::{extract_json_block, sanitize_llm_output};
pub use types::{GenerationOutput, Generator, SamplingConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Ollama is not running at {0}")]
    Connection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Model {0} is not available")]
    NoModelAvailable(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}
