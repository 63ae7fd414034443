//! Cheap-model refinement: patch the previous SQL against a follow-up
//! request. This path must never regenerate from scratch; that is the
//! orchestrator's fallback.

use crate::llm::schemas::{parse_response, RefinementResponse};
use crate::llm::{ChatRequest, LlmError, LlmManager, ModelTier};

const SYSTEM: &str = r#"You adjust an existing analytical SQL query to match a follow-up request.
Rules:
- Edit the previous query; do not rewrite it from scratch.
- Keep every filter, join and alias that the request does not ask to change.
- Only use columns that already appear in the previous query or that the request names.
Respond with JSON only: {"sql": "<the adjusted query>", "changes": ["<human readable change>", ...]}"#;

#[derive(Debug, Clone)]
pub struct Refined {
    pub sql: String,
    pub changes: Vec<String>,
}

pub async fn refine(
    llm: &LlmManager,
    question: &str,
    previous_sql: &str,
) -> Result<Refined, LlmError> {
    let user = format!(
        "Previous SQL:\n```sql\n{}\n```\n\nFollow-up request: {}",
        previous_sql, question
    );

    let raw = llm
        .complete(&ChatRequest::new(SYSTEM, user, ModelTier::Refine))
        .await?;
    let parsed: RefinementResponse = parse_response(&raw)?;

    Ok(Refined {
        sql: parsed.sql,
        changes: parsed.changes,
    })
}
