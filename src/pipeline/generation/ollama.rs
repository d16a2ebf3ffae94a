use serde::{Deserialize, Serialize};

use super::types::{GenerationOutput, Generator, SamplingConfig};
use super::GenerationError;

/// Ollama HTTP client for local LLM inference.
///
/// Prompts in a batch are sent one request at a time; the first failing
/// request fails the batch.
pub struct OllamaGenerator {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    format: Option<serde_json::Value>,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GenerationError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
            format: None,
        })
    }

    /// Constrain decoding to a JSON schema (Ollama's `format` parameter).
    pub fn with_format(mut self, schema: serde_json::Value) -> Self {
        self.format = Some(schema);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Fail early when the configured model is not pulled.
    pub fn ensure_model_available(&self) -> Result<(), GenerationError> {
        if self.is_model_available(&self.model)? {
            Ok(())
        } else {
            Err(GenerationError::NoModelAvailable(self.model.clone()))
        }
    }

    pub fn is_model_available(&self, model: &str) -> Result<bool, GenerationError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }

    pub fn list_models(&self) -> Result<Vec<String>, GenerationError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| GenerationError::ResponseParsing(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    fn generate_one(&self, prompt: &str, sampling: &SamplingConfig) -> Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: self.format.as_ref(),
            options: OllamaOptions::from(sampling),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| GenerationError::ResponseParsing(e.to_string()))?;

        Ok(parsed.response)
    }

    fn map_send_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_connect() {
            GenerationError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            GenerationError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            GenerationError::HttpClient(e.to_string())
        }
    }
}

impl Generator for OllamaGenerator {
    fn generate(
        &self,
        prompts: &[String],
        sampling: &SamplingConfig,
    ) -> Result<Vec<GenerationOutput>, GenerationError> {
        let mut outputs = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let text = self.generate_one(prompt, sampling)?;
            outputs.push(into_output(text));
        }
        Ok(outputs)
    }

    fn ensure_ready(&self) -> Result<(), GenerationError> {
        self.ensure_model_available()
    }
}

/// Schema-constrained responses are JSON already; anything else stays text
/// for the parser to dig through.
fn into_output(text: String) -> GenerationOutput {
    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) if value.is_object() => GenerationOutput::Structured(value),
        _ => GenerationOutput::Text(text),
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize, PartialEq)]
struct OllamaOptions {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    repeat_penalty: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

impl From<&SamplingConfig> for OllamaOptions {
    fn from(s: &SamplingConfig) -> Self {
        Self {
            temperature: s.temperature,
            top_k: s.top_k,
            top_p: s.top_p,
            repeat_penalty: s.repetition_penalty,
            num_predict: s.max_tokens,
            seed: s.seed,
        }
    }
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}
