use serde_json::Value;
use thiserror::Error;

use crate::heuristics::{heuristic_from_value, Heuristic};

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("response does not contain a JSON object")]
    NoJson,
    #[error("invalid JSON in response: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Extract the JSON object from a model response.
///
/// Strips markdown fences, leading commentary, and trailing commentary
/// to return only the outermost `{ ... }` block.
pub fn extract_json(response: &str) -> Option<String> {
    let trimmed = response.trim();

    if trimmed.is_empty() {
        return None;
    }

    let mut text = trimmed;

    // Remove opening fence: ```json or ```
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest.trim_start_matches('\n');
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest.trim_start_matches('\n');
    }

    // Remove closing fence
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end_matches('\n');
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }

    Some(text[start..=end].trim().to_string())
}

/// Parse a model response into a heuristic. Malformed nodes inside
/// well-formed field lists are dropped, not reported.
pub fn parse_heuristic_response(response: &str) -> Result<Heuristic, PromptError> {
    let json = extract_json(response).ok_or(PromptError::NoJson)?;
    let value: Value = serde_json::from_str(&json)?;
    Ok(heuristic_from_value(&value))
}
