//! Generation output → entity payload.

use serde::{Deserialize, Serialize};

use super::error::ExtractionError;
use crate::pipeline::generation::{extract_json_block, sanitize_llm_output, GenerationOutput};

/// Entities extracted from one clinical text. Both fields are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPayload {
    pub drugs: Vec<String>,
    pub regimens: Vec<String>,
}

/// A validated payload plus the full JSON object it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedOutput {
    pub payload: EntityPayload,
    /// The model's JSON object re-serialized, unknown fields included.
    pub raw_json: String,
}

/// Parse one generation result.
///
/// Free text is sanitized and the JSON object located inside it. The object
/// must carry `drugs` and `regimens` arrays of strings.
pub fn parse_output(output: &GenerationOutput) -> Result<ParsedOutput, ExtractionError> {
    let value = match output {
        GenerationOutput::Structured(value) => value.clone(),
        GenerationOutput::Text(text) => {
            let cleaned = sanitize_llm_output(text);
            let block = extract_json_block(&cleaned)
                .ok_or_else(|| ExtractionError::JsonParsing("No JSON object in output".into()))?;
            serde_json::from_str(block).map_err(|e| ExtractionError::JsonParsing(e.to_string()))?
        }
    };

    let payload: EntityPayload = serde_json::from_value(value.clone())
        .map_err(|e| ExtractionError::JsonParsing(e.to_string()))?;
    let raw_json =
        serde_json::to_string(&value).map_err(|e| ExtractionError::JsonParsing(e.to_string()))?;

    Ok(ParsedOutput { payload, raw_json })
}
