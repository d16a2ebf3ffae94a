//! Post-LLM output cleanup before JSON parsing.
//!
//! Strips reasoning blocks and stray tokens some models emit, then locates
//! the JSON object inside whatever prose or code fence surrounds it.

use std::sync::LazyLock;

use regex::Regex;

/// Strip model-specific artifacts from raw LLM output.
///
/// Handles:
/// 1. `<think>...</think>` reasoning blocks
/// 2. Gemma thinking prefixes (`<unusedN>thought\n...`) and stray `<unusedN>` tokens
/// 3. Leading/trailing whitespace
pub fn sanitize_llm_output(raw: &str) -> String {
    static THINK_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));
    static UNUSED_TOKEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

    let mut text = THINK_BLOCK_RE.replace_all(raw, "").to_string();

    if let Some(idx) = text.find("<unused") {
        if let Some(thought_offset) = text[idx..].find("thought\n") {
            text = text[idx + thought_offset + 8..].to_string();
        }
    }

    text = UNUSED_TOKEN_RE.replace_all(&text, "").to_string();
    text.trim().to_string()
}

/// The JSON object inside a response: the body of a ```` ```json ```` fence
/// if present, otherwise the span from the first `{` to the last `}`.
pub fn extract_json_block(response: &str) -> Option<&str> {
    if let Some(start) = response.find("```json") {
        let content_start = start + 7;
        if let Some(end) = response[content_start..].find("```") {
            return Some(response[content_start..content_start + end].trim());
        }
    }

    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_think_block() {
        let raw = "<think>The note mentions R-CHOP...</think>\n{\"drugs\": [], \"regimens\": [\"R-CHOP\"]}";
        assert_eq!(sanitize_llm_output(raw), "{\"drugs\": [], \"regimens\": [\"R-CHOP\"]}");
    }

    #[test]
    fn strips_gemma_thinking_prefix() {
        let raw = "<unused94>thought\nLooking for drugs\n{\"drugs\": [\"cisplatin\"]}";
        assert_eq!(sanitize_llm_output(raw), "Looking for drugs\n{\"drugs\": [\"cisplatin\"]}");
    }

    #[test]
    fn clean_text_unchanged() {
        let text = "{\"drugs\": [\"cisplatin\"], \"regimens\": []}";
        assert_eq!(sanitize_llm_output(text), text);
    }

    #[test]
    fn extracts_fenced_json() {
        let response = "Here you go:\n```json\n{\"drugs\": []}\n```\nDone.";
        assert_eq!(extract_json_block(response), Some("{\"drugs\": []}"));
    }

    #[test]
    fn extracts_bare_object_from_prose() {
        let response = "The answer is {\"drugs\": [\"a\"], \"regimens\": []} as requested.";
        assert_eq!(
            extract_json_block(response),
            Some("{\"drugs\": [\"a\"], \"regimens\": []}")
        );
    }

    #[test]
    fn no_object_is_none() {
        assert_eq!(extract_json_block("no json here"), None);
        assert_eq!(extract_json_block("} backwards {"), None);
    }
}
