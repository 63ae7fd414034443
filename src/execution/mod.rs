//! Execution retry engine: runs SQL against the warehouse, classifies
//! failures, retries transient ones with jittered backoff and asks the
//! model to repair auto-fixable ones, all under a hard attempt bound.

pub mod warehouse;

use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::generate::validator::{AD_SALES_COLUMNS, PRODUCT_COLUMNS};
use crate::learning::LearningStore;
use crate::llm::schemas::{parse_response, AutoFixResponse};
use crate::llm::{ChatRequest, LlmManager, ModelTier};
use crate::util::best_effort;
use warehouse::{QueryRows, Warehouse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    AutoFixable,
    Fatal,
}

/// Substring classification of a warehouse error message.
pub fn classify_error(message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();

    const TRANSIENT: &[&str] = &[
        "timeout",
        "timed out",
        "rate limit",
        "too many requests",
        "connection",
        "temporarily unavailable",
        "out of memory",
    ];
    const FATAL: &[&str] = &[
        "permission denied",
        "access denied",
        "not authorized",
        "quota exceeded",
        "read-only",
    ];

    if TRANSIENT.iter().any(|s| lowered.contains(s)) {
        ErrorKind::Transient
    } else if FATAL.iter().any(|s| lowered.contains(s)) {
        ErrorKind::Fatal
    } else {
        // Malformed SQL is the common case; give the model a chance to
        // repair it. The attempt bound caps the cost of a wrong guess.
        ErrorKind::AutoFixable
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 8_000,
        }
    }
}

/// Un-jittered backoff envelope for a given attempt index.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let raw = config.base_delay_ms as f64 * config.multiplier.powi(attempt as i32);
    Duration::from_millis(raw.min(config.max_delay_ms as f64) as u64)
}

/// Applies uniform +/-20% jitter to avoid synchronized retry storms.
pub fn jittered(delay: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.8..=1.2);
    Duration::from_millis((delay.as_millis() as f64 * factor) as u64)
}

/// One failed attempt, immutable once recorded.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub sql: String,
    pub error: String,
    pub kind: ErrorKind,
    pub fix_attempted: bool,
}

#[derive(Debug)]
pub struct ExecutionSuccess {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
    pub row_count: usize,
    pub execution_time_ms: u64,
    pub final_sql: String,
    /// Failed attempts that preceded the success, oldest first.
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Debug)]
pub struct ExecutionFailure {
    pub error: String,
    pub attempts: Vec<AttemptRecord>,
}

enum RetryState {
    Attempting,
    Retrying { delay: Duration },
    Exhausted,
}

const FIX_SYSTEM: &str = r#"A SQL query against an analytics warehouse failed. Repair it if you can.
Only use the allowed columns listed by the caller. If the query cannot be repaired
from the information given, say so instead of guessing.
Respond with JSON only:
{"canFix": true|false, "fixedSql": "<repaired query>", "explanation": "<what was wrong>", "clarifyingQuestion": "<question for the analyst, if any>"}"#;

pub struct RetryEngine {
    warehouse: Arc<dyn Warehouse>,
    llm: Arc<LlmManager>,
    learning: Arc<LearningStore>,
    config: RetryConfig,
}

impl RetryEngine {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        llm: Arc<LlmManager>,
        learning: Arc<LearningStore>,
        config: RetryConfig,
    ) -> Self {
        Self {
            warehouse,
            llm,
            learning,
            config,
        }
    }

    /// Executes SQL with up to `max_retries` additional attempts. Transient
    /// failures retry the same SQL after a backoff sleep; auto-fixable
    /// failures may swap in a model-repaired query; fatal failures stop
    /// immediately.
    pub async fn execute(
        &self,
        question: &str,
        sql: &str,
    ) -> Result<ExecutionSuccess, ExecutionFailure> {
        let mut current_sql = sql.to_string();
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut attempt: u32 = 0;

        loop {
            let started = Instant::now();
            match self.warehouse.execute(&current_sql).await {
                Ok(QueryRows { columns, rows }) => {
                    let execution_time_ms = started.elapsed().as_millis() as u64;
                    let row_count = rows.len();
                    info!(
                        "query succeeded on attempt {}: {} rows in {}ms",
                        attempt + 1,
                        row_count,
                        execution_time_ms
                    );
                    self.log_success(question, &current_sql, row_count, execution_time_ms);
                    return Ok(ExecutionSuccess {
                        columns,
                        rows,
                        row_count,
                        execution_time_ms,
                        final_sql: current_sql,
                        attempts,
                    });
                }
                Err(err) => {
                    let latency_ms = started.elapsed().as_millis() as u64;
                    let message = err.to_string();
                    let kind = classify_error(&message);
                    warn!(
                        "attempt {} failed ({:?}): {}",
                        attempt + 1,
                        kind,
                        message
                    );

                    let tried_sql = current_sql.clone();
                    let mut fix_attempted = false;

                    let state = if kind == ErrorKind::Fatal || attempt >= self.config.max_retries {
                        RetryState::Exhausted
                    } else {
                        match kind {
                            ErrorKind::Transient => RetryState::Retrying {
                                delay: jittered(backoff_delay(&self.config, attempt)),
                            },
                            ErrorKind::AutoFixable => {
                                fix_attempted = true;
                                if let Some(fixed) = self.request_fix(&current_sql, &message).await
                                {
                                    if acceptable_fix(&fixed, &current_sql) {
                                        info!("adopting model-repaired SQL for next attempt");
                                        current_sql = fixed;
                                    }
                                }
                                RetryState::Attempting
                            }
                            ErrorKind::Fatal => unreachable!("fatal is exhausted above"),
                        }
                    };

                    self.log_failure(question, &tried_sql, &message, latency_ms);
                    attempts.push(AttemptRecord {
                        attempt: attempt + 1,
                        sql: tried_sql,
                        error: message.clone(),
                        kind,
                        fix_attempted,
                    });

                    match state {
                        RetryState::Exhausted => {
                            return Err(ExecutionFailure {
                                error: message,
                                attempts,
                            });
                        }
                        RetryState::Retrying { delay } => {
                            tokio::time::sleep(delay).await;
                        }
                        RetryState::Attempting => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Asks the model for a repaired query; None on any failure, since a
    /// missing fix only means the same SQL is retried.
    async fn request_fix(&self, sql: &str, error: &str) -> Option<String> {
        let user = format!(
            "Failing SQL:\n```sql\n{}\n```\n\nError:\n{}\n\nAllowed columns:\n- ad_sales: {}\n- products: {}",
            sql,
            error,
            AD_SALES_COLUMNS.join(", "),
            PRODUCT_COLUMNS.join(", "),
        );
        let raw = match self
            .llm
            .complete(&ChatRequest::new(FIX_SYSTEM, user, ModelTier::Full))
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("auto-fix request failed: {}", e);
                return None;
            }
        };
        match parse_response::<AutoFixResponse>(&raw) {
            Ok(fix) if fix.can_fix => {
                info!("model diagnosis: {}", fix.explanation);
                fix.fixed_sql
            }
            Ok(fix) => {
                if let Some(q) = fix.clarifying_question {
                    info!("model declined to fix, asks: {}", q);
                }
                None
            }
            Err(e) => {
                warn!("auto-fix response rejected: {}", e);
                None
            }
        }
    }

    fn log_success(&self, question: &str, sql: &str, row_count: usize, latency_ms: u64) {
        let learning = Arc::clone(&self.learning);
        let question = question.to_string();
        let sql = sql.to_string();
        best_effort("execution success log", async move {
            learning
                .record_success(&question, &sql, row_count, latency_ms)
                .await?;
            Ok(())
        });
    }

    fn log_failure(&self, question: &str, sql: &str, error: &str, latency_ms: u64) {
        let learning = Arc::clone(&self.learning);
        let question = question.to_string();
        let sql = sql.to_string();
        let error = error.to_string();
        best_effort("execution failure log", async move {
            learning
                .record_failure(&question, &sql, &error, latency_ms)
                .await?;
            Ok(())
        });
    }
}

/// A patched query replaces the failing one only when it is non-empty,
/// textually different and still a SELECT.
fn acceptable_fix(fixed: &str, current: &str) -> bool {
    let trimmed = fixed.trim();
    !trimmed.is_empty()
        && trimmed != current.trim()
        && trimmed.to_lowercase().starts_with("select")
}
