use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::execution::AttemptRecord;
use crate::generate::SqlSource;
use crate::metadata::models::{ConversationMessage, Role};
use crate::util::best_effort;
use crate::web::state::AppState;

/// Rows kept in the assistant-message snapshot; enough to anchor a
/// follow-up without storing whole result sets.
const SNAPSHOT_ROWS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub sql: String,
    pub source: SqlSource,
    pub confidence: f64,
    pub understanding: Option<String>,
    pub warnings: Vec<String>,
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Serialize)]
pub struct AskError {
    pub error: String,
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub concept_count: usize,
    pub table_count: usize,
    pub pattern_count: usize,
    pub rule_count: usize,
}

// Question to executed result
pub async fn ask(
    state: State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<AskError>)> {
    let question = payload.question.trim().to_string();
    if question.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(AskError {
                error: "question must not be empty".to_string(),
                attempts: vec![],
            }),
        ));
    }
    info!("question received: {}", question);

    let generated = state
        .orchestrator
        .generate(&question, payload.session_id.as_deref())
        .await
        .map_err(|e| {
            error!("generation failed: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(AskError {
                    error: e.to_string(),
                    attempts: vec![],
                }),
            )
        })?;

    match state.engine.execute(&question, &generated.sql).await {
        Ok(result) => {
            record_pattern_outcome(&state, generated.matched_pattern, true);
            if let Some(session_id) = payload.session_id.as_deref() {
                remember_exchange(&state, session_id, &question, &result);
            }
            Ok(Json(AskResponse {
                sql: result.final_sql,
                source: generated.source,
                confidence: generated.confidence,
                understanding: generated.understanding,
                warnings: generated.warnings,
                columns: result.columns,
                rows: result.rows,
                row_count: result.row_count,
                execution_time_ms: result.execution_time_ms,
                attempts: result.attempts,
            }))
        }
        Err(failure) => {
            record_pattern_outcome(&state, generated.matched_pattern, false);
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(AskError {
                    error: failure.error,
                    attempts: failure.attempts,
                }),
            ))
        }
    }
}

// Conversation history
pub async fn history(
    state: State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let messages = state
        .conversations
        .recent(&session_id, state.config.memory.window)
        .await
        .map_err(|e| {
            error!("history fetch failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(messages))
}

// System status
pub async fn system_status(
    state: State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let counts = state.metadata.catalog_counts().await.map_err(|e| {
        error!("status fetch failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let uptime = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        concept_count: counts.concepts,
        table_count: counts.tables,
        pattern_count: counts.patterns,
        rule_count: counts.rules,
    }))
}

fn record_pattern_outcome(state: &AppState, pattern_id: Option<i64>, success: bool) {
    let Some(pattern_id) = pattern_id else {
        return;
    };
    let learning = Arc::clone(&state.learning);
    best_effort("pattern outcome write", async move {
        learning.record_pattern_outcome(pattern_id, success).await?;
        Ok(())
    });
}

/// Appends the user/assistant exchange to the session log. Best-effort: a
/// lost message only degrades follow-up quality.
fn remember_exchange(
    state: &AppState,
    session_id: &str,
    question: &str,
    result: &crate::execution::ExecutionSuccess,
) {
    let conversations = Arc::clone(&state.conversations);
    let session_id = session_id.to_string();
    let question = question.to_string();
    let sql = result.final_sql.clone();
    let snapshot = serde_json::json!({
        "row_count": result.row_count,
        "rows": result.rows.iter().take(SNAPSHOT_ROWS).collect::<Vec<_>>(),
    });
    let row_count = result.row_count;

    best_effort("conversation append", async move {
        let now = Utc::now();
        conversations
            .append(ConversationMessage {
                session_id: session_id.clone(),
                role: Role::User,
                content: question,
                sql: None,
                result_snapshot: None,
                created_at: now,
            })
            .await?;
        conversations
            .append(ConversationMessage {
                session_id,
                role: Role::Assistant,
                content: format!("Returned {} rows", row_count),
                sql: Some(sql),
                result_snapshot: Some(snapshot),
                created_at: now,
            })
            .await?;
        Ok(())
    });
}
