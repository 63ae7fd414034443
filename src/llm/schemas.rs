//! Strict response schemas per completion call type. A response that fails
//! to parse or is missing a required key is a hard failure of that call,
//! never a partial result.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::llm::LlmError;

/// Full-generation response.
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    pub reasoning: String,
    pub understanding: String,
    pub sql: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Follow-up refinement response.
#[derive(Debug, Deserialize)]
pub struct RefinementResponse {
    pub sql: String,
    #[serde(default)]
    pub changes: Vec<String>,
}

/// AI-assisted repair response for auto-fixable execution errors.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFixResponse {
    pub can_fix: bool,
    #[serde(default)]
    pub fixed_sql: Option<String>,
    pub explanation: String,
    #[serde(default)]
    pub clarifying_question: Option<String>,
}

/// Parses a model response into the expected schema, tolerating a markdown
/// code fence around the JSON body.
pub fn parse_response<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let body = strip_fences(raw);
    serde_json::from_str(body).map_err(|e| {
        LlmError::SchemaError(format!("response did not match expected schema: {}", e))
    })
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag ("json") after the opening fence.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\r', '\n']);
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest)
}
