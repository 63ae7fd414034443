//! Feedback/learning store: every execution outcome is recorded, repeated
//! failure signatures accumulate into error patterns, and patterns that
//! cross the occurrence threshold become learned-rule candidates.

use chrono::Utc;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::info;

use crate::metadata::models::{
    ErrorCategory, ExecutionRecord, FeedbackCategory, LearnedRule, Outcome, RuleKind,
};
use crate::metadata::{CatalogStore, StoreError};
use crate::util::cache::{Clock, TtlCache};

/// Occurrence count at which an error pattern triggers candidate analysis.
pub const PROMOTION_THRESHOLD: i64 = 3;

const SIGNATURE_MAX_CHARS: usize = 120;

pub struct LearningStore {
    catalog: Arc<dyn CatalogStore>,
    rules_cache: TtlCache<Vec<LearnedRule>>,
}

impl LearningStore {
    pub fn new(catalog: Arc<dyn CatalogStore>, rules_ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            rules_cache: TtlCache::new(rules_ttl_secs, clock),
        }
    }

    /// Currently active learned rules, cached with a TTL.
    pub async fn active_rules(&self) -> Result<Vec<LearnedRule>, StoreError> {
        if let Some(cached) = self.rules_cache.get().await {
            return Ok(cached);
        }
        let active: Vec<LearnedRule> = self
            .catalog
            .learned_rules()
            .await?
            .into_iter()
            .filter(|r| r.active)
            .collect();
        self.rules_cache.put(active.clone()).await;
        Ok(active)
    }

    pub async fn record_success(
        &self,
        question: &str,
        sql: &str,
        row_count: usize,
        latency_ms: u64,
    ) -> Result<(), StoreError> {
        self.catalog
            .insert_execution_record(ExecutionRecord {
                question: question.to_string(),
                sql: sql.to_string(),
                outcome: Outcome::Success,
                row_count: Some(row_count),
                error: None,
                latency_ms,
                created_at: Utc::now(),
            })
            .await
    }

    pub async fn record_failure(
        &self,
        question: &str,
        sql: &str,
        error: &str,
        latency_ms: u64,
    ) -> Result<(), StoreError> {
        let outcome = if error.to_lowercase().contains("timeout") {
            Outcome::Timeout
        } else {
            Outcome::Error
        };
        self.catalog
            .insert_execution_record(ExecutionRecord {
                question: question.to_string(),
                sql: sql.to_string(),
                outcome,
                row_count: None,
                error: Some(error.to_string()),
                latency_ms,
                created_at: Utc::now(),
            })
            .await?;
        self.note_error(error).await?;
        Ok(())
    }

    /// Upserts the error's signature and runs candidate analysis when the
    /// occurrence count crosses the promotion threshold. Returns the count
    /// after the upsert.
    pub async fn note_error(&self, error: &str) -> Result<i64, StoreError> {
        let (category, signature) = error_signature(error);
        let occurrences = self
            .catalog
            .upsert_error_pattern(&signature, category, error)
            .await?;
        if occurrences == PROMOTION_THRESHOLD {
            self.promote(&signature, category, error, occurrences).await?;
        }
        Ok(occurrences)
    }

    pub async fn record_example(
        &self,
        question: &str,
        sql: &str,
        category: FeedbackCategory,
    ) -> Result<(), StoreError> {
        self.catalog.insert_example(question, sql, category).await
    }

    pub async fn record_pattern_outcome(
        &self,
        pattern_id: i64,
        success: bool,
    ) -> Result<(), StoreError> {
        self.catalog.record_pattern_outcome(pattern_id, success).await
    }

    /// Candidate analysis at the threshold. When the error text carries a
    /// concrete correction (warehouse "did you mean" hints), an inactive
    /// column-fix rule is created for review; otherwise the candidate is
    /// only logged. Activation is a manual step: a bad literal substitution
    /// would silently corrupt every later query.
    async fn promote(
        &self,
        signature: &str,
        category: ErrorCategory,
        context: &str,
        occurrences: i64,
    ) -> Result<(), StoreError> {
        if category == ErrorCategory::Column {
            if let Some((wrong, right)) = extract_column_correction(context) {
                info!(
                    "promoting error pattern '{}' to learned-rule candidate: {} -> {}",
                    signature, wrong, right
                );
                self.catalog
                    .insert_learned_rule(RuleKind::ColumnFix, &wrong, &right, occurrences, false)
                    .await?;
                return Ok(());
            }
        }
        info!(
            "error pattern '{}' crossed the promotion threshold with no automatic correction",
            signature
        );
        Ok(())
    }
}

/// Coarse category inferred from substring checks.
pub fn categorize(message: &str) -> ErrorCategory {
    let lowered = message.to_lowercase();
    if lowered.contains("column") {
        ErrorCategory::Column
    } else if lowered.contains("syntax") || lowered.contains("parser") {
        ErrorCategory::Syntax
    } else if lowered.contains("table") || lowered.contains("catalog") {
        ErrorCategory::Table
    } else {
        ErrorCategory::Semantic
    }
}

/// Normalized signature: category prefix plus lowercased error text with
/// quoted names and numbers collapsed to placeholders, truncated.
pub fn error_signature(message: &str) -> (ErrorCategory, String) {
    let category = categorize(message);
    let normalized = normalize(message);
    (category, format!("{}:{}", category.as_str(), normalized))
}

fn normalize(message: &str) -> String {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let quoted = QUOTED.get_or_init(|| Regex::new(r#""[^"]*"|'[^']*'"#).unwrap());
    let digits = DIGITS.get_or_init(|| Regex::new(r"\d+").unwrap());
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").unwrap());

    let lowered = message.to_lowercase();
    let collapsed = quoted.replace_all(&lowered, "?");
    let collapsed = digits.replace_all(&collapsed, "N");
    let collapsed = spaces.replace_all(&collapsed, " ");
    collapsed.trim().chars().take(SIGNATURE_MAX_CHARS).collect()
}

/// Pulls (wrong, right) out of warehouse binder errors like
/// `Referenced column "amnt" not found ... Did you mean "amount"?`.
fn extract_column_correction(context: &str) -> Option<(String, String)> {
    static WRONG: OnceLock<Regex> = OnceLock::new();
    static RIGHT: OnceLock<Regex> = OnceLock::new();

    let wrong_re =
        WRONG.get_or_init(|| Regex::new(r#"(?i)column "([a-z_][a-z0-9_]*)""#).unwrap());
    let right_re = RIGHT.get_or_init(|| {
        Regex::new(r#"(?i)did you mean "?([a-z_][a-z0-9_.]*)"?"#).unwrap()
    });

    let wrong = wrong_re.captures(context)?[1].to_string();
    let right_raw = right_re.captures(context)?[1].to_string();
    // Candidate bindings may be qualified; keep the column part.
    let right = right_raw
        .rsplit('.')
        .next()
        .unwrap_or(&right_raw)
        .to_string();
    if wrong == right {
        return None;
    }
    Some((wrong, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemoryCatalog;
    use crate::util::cache::testing::ManualClock;
    use crate::util::cache::Clock;

    fn store_with(catalog: Arc<MemoryCatalog>) -> LearningStore {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        LearningStore::new(catalog, 300, clock as Arc<dyn Clock>)
    }

    #[test]
    fn signature_is_normalized_and_prefixed() {
        let (category, signature) =
            error_signature("Binder Error: Referenced column \"amnt\" not found in row 42");
        assert_eq!(category, ErrorCategory::Column);
        assert_eq!(signature, "column:binder error: referenced column ? not found in row N");
    }

    #[test]
    fn identical_errors_share_a_signature_across_literals() {
        let (_, a) = error_signature("Table 'tmp_1' does not exist");
        let (_, b) = error_signature("Table 'tmp_2' does not exist");
        assert_eq!(a, b);
    }

    #[test]
    fn category_inference_by_substring() {
        assert_eq!(categorize("Parser Error: syntax error at or near"), ErrorCategory::Syntax);
        assert_eq!(categorize("Catalog Error: Table with name x does not exist"), ErrorCategory::Table);
        assert_eq!(categorize("something unexpected"), ErrorCategory::Semantic);
    }

    #[tokio::test]
    async fn third_occurrence_reads_three_and_triggers_promotion() {
        let catalog = Arc::new(MemoryCatalog::with_seed());
        let store = store_with(Arc::clone(&catalog));
        let error = r#"Binder Error: Referenced column "amnt" not found! Did you mean "amount"?"#;

        assert_eq!(store.note_error(error).await.unwrap(), 1);
        assert_eq!(store.note_error(error).await.unwrap(), 2);
        assert_eq!(store.note_error(error).await.unwrap(), 3);

        let (_, signature) = error_signature(error);
        assert_eq!(catalog.error_pattern_occurrences(&signature), Some(3));

        // Candidate analysis created an inactive rule for review.
        let rules = catalog.learned_rules_snapshot();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].pattern, "amnt");
        assert_eq!(rules[0].correction, "amount");
        assert!(!rules[0].active);
    }

    #[tokio::test]
    async fn promotion_without_a_hint_only_logs() {
        let catalog = Arc::new(MemoryCatalog::with_seed());
        let store = store_with(Arc::clone(&catalog));

        for _ in 0..3 {
            store.note_error("Out of Memory Error: could not allocate").await.unwrap();
        }
        assert!(catalog.learned_rules_snapshot().is_empty());
    }

    #[tokio::test]
    async fn active_rules_are_cached_and_filtered() {
        let catalog = Arc::new(MemoryCatalog::with_seed());
        catalog.add_learned_rule("wrong", "right", true);
        catalog.add_learned_rule("dormant", "unused", false);
        let store = store_with(Arc::clone(&catalog));

        let rules = store.active_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].pattern, "wrong");

        store.active_rules().await.unwrap();
        assert_eq!(catalog.learned_rule_fetches(), 1);
    }
}
