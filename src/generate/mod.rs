//! Generation orchestrator: routes between the cheap refinement path and
//! full generation, post-processes model output, and records outcomes for
//! the learning loop.

pub mod validator;

use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::context::{ContextBuilder, QueryContext};
use crate::conversation::classifier::{self, QuestionKind};
use crate::conversation::{self, refine};
use crate::learning::LearningStore;
use crate::llm::schemas::{parse_response, GenerationResponse};
use crate::llm::{ChatRequest, LlmError, LlmManager, ModelTier};
use crate::metadata::models::FeedbackCategory;
use crate::metadata::{ConversationStore, StoreError};
use crate::util::best_effort;

#[derive(Debug)]
pub enum GenerateError {
    Llm(LlmError),
    Store(StoreError),
    InvalidColumns(Vec<String>),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Llm(e) => write!(f, "generation failed: {}", e),
            GenerateError::Store(e) => write!(f, "generation failed: {}", e),
            GenerateError::InvalidColumns(columns) => write!(
                f,
                "generated SQL references unknown columns: {}",
                columns.join(", ")
            ),
        }
    }
}

impl Error for GenerateError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlSource {
    Refined,
    Generated,
}

#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub sql: String,
    pub warnings: Vec<String>,
    pub source: SqlSource,
    pub confidence: f64,
    pub understanding: Option<String>,
    /// Best-matching query pattern, for outcome bookkeeping.
    pub matched_pattern: Option<i64>,
}

const GENERATION_SYSTEM: &str = r#"You translate an analyst's business question into one analytical SQL query for a DuckDB warehouse.
Adhere to these rules:
- Only use the tables, columns, joins and formulas provided in the context; column names are case sensitive.
- Use table aliases to prevent ambiguity.
- When creating a ratio, always cast the numerator as float.
- Apply every business rule listed in the context.
- Use lowercase SQL keywords.
Respond with JSON only:
{"reasoning": "<step by step reasoning>", "understanding": "<one sentence restating the question>", "sql": "<the query>", "warnings": ["<assumption or caveat>", ...]}"#;

pub struct Orchestrator {
    context: Arc<ContextBuilder>,
    llm: Arc<LlmManager>,
    conversations: Arc<dyn ConversationStore>,
    learning: Arc<LearningStore>,
    memory_window: usize,
}

impl Orchestrator {
    pub fn new(
        context: Arc<ContextBuilder>,
        llm: Arc<LlmManager>,
        conversations: Arc<dyn ConversationStore>,
        learning: Arc<LearningStore>,
        memory_window: usize,
    ) -> Self {
        Self {
            context,
            llm,
            conversations,
            learning,
            memory_window,
        }
    }

    /// Generates SQL for a question. A follow-up in an existing session
    /// tries the cheap refinement path first; any failure there falls back
    /// to full generation rather than surfacing.
    pub async fn generate(
        &self,
        question: &str,
        session_id: Option<&str>,
    ) -> Result<Generated, GenerateError> {
        if let Some(session_id) = session_id {
            match conversation::session_context(
                self.conversations.as_ref(),
                session_id,
                self.memory_window,
            )
            .await
            {
                Ok(session) => {
                    let classification = classifier::classify(question, &session);
                    info!(
                        "classified question as {:?} ({:.2}): {}",
                        classification.kind, classification.confidence, classification.reason
                    );
                    if classification.kind == QuestionKind::FollowUp {
                        let previous_sql = session
                            .last_sql_message
                            .as_ref()
                            .and_then(|m| m.sql.clone());
                        if let Some(previous_sql) = previous_sql {
                            match self
                                .try_refine(question, &previous_sql, classification.confidence)
                                .await
                            {
                                Ok(generated) => return Ok(generated),
                                Err(e) => {
                                    warn!(
                                        "refinement failed, falling back to full generation: {}",
                                        e
                                    );
                                }
                            }
                        }
                    }
                }
                Err(e) => warn!("conversation context unavailable: {}", e),
            }
        }

        self.full_generation(question).await
    }

    async fn try_refine(
        &self,
        question: &str,
        previous_sql: &str,
        confidence: f64,
    ) -> Result<Generated, GenerateError> {
        let refined = refine::refine(self.llm.as_ref(), question, previous_sql)
            .await
            .map_err(GenerateError::Llm)?;
        let (sql, mut warnings) = self.post_process(&refined.sql).await?;
        warnings.extend(refined.changes);

        self.record_example(question, &sql);
        Ok(Generated {
            sql,
            warnings,
            source: SqlSource::Refined,
            confidence,
            understanding: None,
            matched_pattern: None,
        })
    }

    async fn full_generation(&self, question: &str) -> Result<Generated, GenerateError> {
        let context = self.context.build(question).await.map_err(GenerateError::Store)?;

        let raw = self
            .llm
            .complete(&ChatRequest::new(
                GENERATION_SYSTEM,
                context.rendered_prompt.clone(),
                ModelTier::Full,
            ))
            .await
            .map_err(GenerateError::Llm)?;

        let parsed: GenerationResponse = match parse_response(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.record_generation_error(&e.to_string());
                return Err(GenerateError::Llm(e));
            }
        };

        debug!("model reasoning: {}", parsed.reasoning);
        let (sql, mut warnings) = self.post_process(&parsed.sql).await?;
        warnings.extend(parsed.warnings);

        self.record_example(question, &sql);
        Ok(Generated {
            sql,
            warnings,
            source: SqlSource::Generated,
            confidence: confidence_for(&context),
            understanding: Some(parsed.understanding),
            matched_pattern: context.patterns.first().map(|p| p.pattern.id),
        })
    }

    /// Unconditional post-processing: static naming fixes, then active
    /// learned rules, then the column allow-list check. SQL that still
    /// references unknown columns is rejected here, before any warehouse
    /// round-trip.
    async fn post_process(&self, raw_sql: &str) -> Result<(String, Vec<String>), GenerateError> {
        let sql = raw_sql.replace('`', "");
        let sql = sql.trim().trim_end_matches(';').trim().to_string();

        let sql = validator::apply_static_fixes(&sql);

        let rules = match self.learning.active_rules().await {
            Ok(rules) => rules,
            Err(e) => {
                warn!("learned rules unavailable, continuing without: {}", e);
                Vec::new()
            }
        };
        let (sql, applied) = validator::apply_learned_rules(&sql, &rules);

        let invalid = validator::invalid_columns(&sql);
        if !invalid.is_empty() {
            self.record_generation_error(&format!(
                "validation: unknown columns: {}",
                invalid.join(", ")
            ));
            return Err(GenerateError::InvalidColumns(invalid));
        }

        let warnings = applied
            .into_iter()
            .map(|a| format!("applied learned correction: {}", a))
            .collect();
        Ok((sql, warnings))
    }

    fn record_example(&self, question: &str, sql: &str) {
        let learning = Arc::clone(&self.learning);
        let question = question.to_string();
        let sql = sql.to_string();
        best_effort("example write", async move {
            learning
                .record_example(&question, &sql, FeedbackCategory::AutoSuccess)
                .await?;
            Ok(())
        });
    }

    fn record_generation_error(&self, message: &str) {
        let learning = Arc::clone(&self.learning);
        let message = message.to_string();
        best_effort("generation error write", async move {
            learning.note_error(&message).await?;
            Ok(())
        });
    }
}

fn confidence_for(context: &QueryContext) -> f64 {
    let mut confidence = 0.5 + 0.1 * context.concepts.len().min(3) as f64;
    if !context.patterns.is_empty() {
        confidence += 0.1;
    }
    confidence.min(0.9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::models::{ConversationMessage, Role};
    use crate::metadata::CatalogStore;
    use crate::testutil::{MemoryCatalog, MemoryConversations, MockCompletion};
    use crate::util::cache::testing::ManualClock;
    use crate::util::cache::Clock;
    use chrono::Utc;

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        conversations: Arc<MemoryConversations>,
        orchestrator: Orchestrator,
    }

    fn fixture(llm_responses: Vec<String>) -> Fixture {
        let catalog = Arc::new(MemoryCatalog::with_seed());
        let conversations = Arc::new(MemoryConversations::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let metadata = Arc::new(crate::metadata::client::MetadataClient::new(
            Arc::clone(&catalog) as Arc<dyn CatalogStore>,
            300,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let learning = Arc::new(LearningStore::new(
            Arc::clone(&catalog) as Arc<dyn CatalogStore>,
            300,
            clock as Arc<dyn Clock>,
        ));
        let llm = Arc::new(LlmManager::with_client(Box::new(MockCompletion::returning(
            llm_responses,
        ))));

        let orchestrator = Orchestrator::new(
            Arc::new(ContextBuilder::new(metadata)),
            llm,
            Arc::clone(&conversations) as Arc<dyn ConversationStore>,
            learning,
            10,
        );
        Fixture {
            catalog,
            conversations,
            orchestrator,
        }
    }

    async fn seed_session(conversations: &MemoryConversations) {
        conversations
            .append(ConversationMessage {
                session_id: "s1".to_string(),
                role: Role::User,
                content: "Compare revenue between October and November 2024".to_string(),
                sql: None,
                result_snapshot: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        conversations
            .append(ConversationMessage {
                session_id: "s1".to_string(),
                role: Role::Assistant,
                content: "Comparison ready".to_string(),
                sql: Some(
                    "SELECT sale_month, SUM(amount) AS total FROM ad_sales \
                     WHERE sale_month IN (10, 11) AND sale_year = 2024 GROUP BY sale_month"
                        .to_string(),
                ),
                result_snapshot: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    const GENERATION_OK: &str = r#"{"reasoning":"aggregate per publisher",
        "understanding":"revenue by publisher",
        "sql":"SELECT publisher, SUM(amount) AS total FROM ad_sales GROUP BY publisher",
        "warnings":[]}"#;

    #[tokio::test]
    async fn new_topic_takes_the_full_generation_path() {
        let fx = fixture(vec![GENERATION_OK.to_string()]);
        let generated = fx
            .orchestrator
            .generate("revenue by publisher", Some("fresh-session"))
            .await
            .unwrap();
        assert_eq!(generated.source, SqlSource::Generated);
        assert!(generated.sql.contains("GROUP BY publisher"));
        assert!((0.0..=1.0).contains(&generated.confidence));
    }

    #[tokio::test]
    async fn follow_up_uses_the_refinement_path() {
        let refinement = r#"{"sql":"SELECT publisher, SUM(amount) AS total FROM ad_sales WHERE sale_year = 2024 GROUP BY publisher","changes":["grouped by publisher"]}"#;
        let fx = fixture(vec![refinement.to_string()]);
        seed_session(&fx.conversations).await;

        let generated = fx
            .orchestrator
            .generate("now show it by publisher", Some("s1"))
            .await
            .unwrap();

        assert_eq!(generated.source, SqlSource::Refined);
        assert!(generated.warnings.iter().any(|w| w == "grouped by publisher"));
        assert!(generated.confidence >= 0.85);
    }

    #[tokio::test]
    async fn refinement_failure_falls_back_to_full_generation() {
        // First response (refinement) is garbage; second is a valid
        // full-generation payload.
        let fx = fixture(vec!["not json at all".to_string(), GENERATION_OK.to_string()]);
        seed_session(&fx.conversations).await;

        let generated = fx
            .orchestrator
            .generate("now show it by publisher", Some("s1"))
            .await
            .expect("fallback must succeed");
        assert_eq!(generated.source, SqlSource::Generated);
    }

    #[tokio::test]
    async fn unknown_columns_fail_generation_naming_the_offenders() {
        let bad = r#"{"reasoning":"...","understanding":"...",
            "sql":"SELECT impressions FROM ad_sales","warnings":[]}"#;
        let fx = fixture(vec![bad.to_string()]);

        let err = fx
            .orchestrator
            .generate("impressions by month", None)
            .await
            .unwrap_err();
        match err {
            GenerateError::InvalidColumns(columns) => {
                assert_eq!(columns, vec!["impressions".to_string()]);
            }
            other => panic!("expected InvalidColumns, got {}", other),
        }
    }

    #[tokio::test]
    async fn static_fix_repairs_known_misnamings_before_validation() {
        let fixable = r#"{"reasoning":"...","understanding":"...",
            "sql":"SELECT publisher, SUM(total_amount) AS total FROM ad_sales GROUP BY publisher",
            "warnings":[]}"#;
        let fx = fixture(vec![fixable.to_string()]);

        let generated = fx
            .orchestrator
            .generate("revenue by publisher", None)
            .await
            .unwrap();
        assert!(generated.sql.contains("SUM(amount)"));
    }

    #[tokio::test]
    async fn failing_example_write_does_not_change_the_result() {
        let fx = fixture(vec![GENERATION_OK.to_string()]);
        fx.catalog.fail_writes(true);

        let generated = fx
            .orchestrator
            .generate("revenue by publisher", None)
            .await
            .expect("fire-and-forget failures stay out of the result");
        assert_eq!(generated.source, SqlSource::Generated);
    }
}
