//! Shared in-memory doubles for the catalog, the completion service and the
//! warehouse. Test-only.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::execution::warehouse::{QueryRows, Warehouse, WarehouseError};
use crate::llm::{ChatRequest, CompletionClient, LlmError, ModelTier};
use crate::metadata::models::{
    BusinessRule, ColumnMeta, Concept, ConversationMessage, ErrorCategory, ErrorPattern, Example,
    ExecutionRecord, FeedbackCategory, JoinHint, LearnedRule, QueryPattern, RuleKind,
    TableMetadata, TargetKind,
};
use crate::metadata::{CatalogCounts, CatalogStore, ConversationStore, StoreError};

fn concept(
    id: i64,
    term_en: Option<&str>,
    term_es: Option<&str>,
    kind: TargetKind,
    target: &str,
    priority: i32,
) -> Concept {
    Concept {
        id,
        term_en: term_en.map(str::to_string),
        term_es: term_es.map(str::to_string),
        target_kind: kind,
        target: target.to_string(),
        priority,
        usage_count: 0,
        active: true,
    }
}

fn column(name: &str, data_type: &str, description: &str, is_key: bool) -> ColumnMeta {
    ColumnMeta {
        name: name.to_string(),
        data_type: data_type.to_string(),
        description: description.to_string(),
        is_key,
    }
}

#[derive(Default)]
struct CatalogState {
    concepts: Vec<Concept>,
    tables: Vec<TableMetadata>,
    patterns: Vec<QueryPattern>,
    rules: Vec<BusinessRule>,
    examples: Vec<Example>,
    learned_rules: Vec<LearnedRule>,
    error_patterns: Vec<ErrorPattern>,
    execution_records: Vec<ExecutionRecord>,
}

/// In-memory [`CatalogStore`] with fetch counters and injectable write
/// failures.
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
    fail_writes: AtomicBool,
    concept_fetches: AtomicUsize,
    table_fetches: AtomicUsize,
    learned_rule_fetches: AtomicUsize,
}

impl MemoryCatalog {
    pub fn with_seed() -> Self {
        let mut state = CatalogState::default();

        state.concepts = vec![
            concept(1, Some("revenue"), Some("ingresos"), TargetKind::Column, "ad_sales.amount", 10),
            concept(2, Some("sales"), Some("ventas"), TargetKind::Table, "ad_sales", 8),
            concept(3, Some("publisher"), Some("editorial"), TargetKind::Column, "ad_sales.publisher", 8),
            concept(4, Some("product"), Some("producto"), TargetKind::Entity, "products.product_name", 7),
            concept(5, Some("format"), Some("formato"), TargetKind::Column, "products.format", 6),
            concept(
                6,
                Some("average price"),
                Some("precio medio"),
                TargetKind::Expression,
                "sum(ad_sales.amount) / nullif(sum(ad_sales.quantity), 0)",
                5,
            ),
        ];

        state.tables = vec![
            TableMetadata {
                name: "ad_sales".to_string(),
                qualified_name: "main.ad_sales".to_string(),
                description: "One row per sale of advertising inventory".to_string(),
                columns: vec![
                    column("sale_id", "BIGINT", "Sale identifier", true),
                    column("sale_date", "DATE", "Date of the sale", false),
                    column("sale_month", "INTEGER", "Calendar month 1-12", false),
                    column("sale_year", "INTEGER", "Calendar year", false),
                    column("publisher", "VARCHAR", "Selling publisher", false),
                    column("campaign", "VARCHAR", "Campaign name", false),
                    column("product_id", "BIGINT", "Product sold", false),
                    column("amount", "DOUBLE", "Net sale amount", false),
                    column("quantity", "INTEGER", "Units sold", false),
                ],
                joins: vec![JoinHint {
                    target_table: "products".to_string(),
                    join_kind: "left".to_string(),
                    predicate: "ad_sales.product_id = products.product_id".to_string(),
                }],
            },
            TableMetadata {
                name: "products".to_string(),
                qualified_name: "main.products".to_string(),
                description: "Product reference data".to_string(),
                columns: vec![
                    column("product_id", "BIGINT", "Product identifier", true),
                    column("product_name", "VARCHAR", "Display name", false),
                    column("format", "VARCHAR", "Ad format", false),
                    column("category", "VARCHAR", "Product category", false),
                    column("unit_price", "DOUBLE", "List price per unit", false),
                ],
                joins: vec![],
            },
        ];

        state.patterns = vec![QueryPattern {
            id: 1,
            name: "top_n_ranking".to_string(),
            intent_keywords: vec![
                "top".to_string(),
                "highest".to_string(),
                "best".to_string(),
                "ranking".to_string(),
            ],
            intent: "Rank a dimension by an aggregate and keep the first N".to_string(),
            sql_template: "select {dim}, sum({measure}) as total from {table} group by {dim} order by total desc limit {n}".to_string(),
            parameters: vec!["dim".to_string(), "measure".to_string(), "n".to_string()],
            example_questions: vec!["top 5 publishers by revenue".to_string()],
            success_count: 8,
            failure_count: 2,
            active: true,
        }];

        state.rules = vec![BusinessRule {
            id: 1,
            name: "net_amounts".to_string(),
            condition: "amount is net of agency discounts; never gross it up".to_string(),
            entity_kinds: vec!["ad_sales.amount".to_string()],
            active: true,
        }];

        Self {
            state: Mutex::new(state),
            fail_writes: AtomicBool::new(false),
            concept_fetches: AtomicUsize::new(0),
            table_fetches: AtomicUsize::new(0),
            learned_rule_fetches: AtomicUsize::new(0),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn concept_fetches(&self) -> usize {
        self.concept_fetches.load(Ordering::SeqCst)
    }

    pub fn table_fetches(&self) -> usize {
        self.table_fetches.load(Ordering::SeqCst)
    }

    pub fn learned_rule_fetches(&self) -> usize {
        self.learned_rule_fetches.load(Ordering::SeqCst)
    }

    pub fn error_pattern_occurrences(&self, signature: &str) -> Option<i64> {
        let state = self.state.lock().unwrap();
        state
            .error_patterns
            .iter()
            .find(|p| p.signature == signature)
            .map(|p| p.occurrences)
    }

    pub fn learned_rules_snapshot(&self) -> Vec<LearnedRule> {
        self.state.lock().unwrap().learned_rules.clone()
    }

    pub fn add_learned_rule(&self, pattern: &str, correction: &str, active: bool) {
        let mut state = self.state.lock().unwrap();
        let id = state.learned_rules.len() as i64 + 1;
        state.learned_rules.push(LearnedRule {
            id,
            kind: RuleKind::ColumnFix,
            pattern: pattern.to_string(),
            correction: correction.to_string(),
            occurrences: 0,
            active,
        });
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Query("injected write failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn concepts(&self) -> Result<Vec<Concept>, StoreError> {
        self.concept_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().concepts.clone())
    }

    async fn tables(&self) -> Result<Vec<TableMetadata>, StoreError> {
        self.table_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().tables.clone())
    }

    async fn patterns(&self) -> Result<Vec<QueryPattern>, StoreError> {
        Ok(self.state.lock().unwrap().patterns.clone())
    }

    async fn rules(&self) -> Result<Vec<BusinessRule>, StoreError> {
        Ok(self.state.lock().unwrap().rules.clone())
    }

    async fn successful_examples(&self, limit: usize) -> Result<Vec<Example>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.examples.iter().rev().take(limit).cloned().collect())
    }

    async fn insert_example(
        &self,
        question: &str,
        sql: &str,
        category: FeedbackCategory,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().unwrap();
        let id = state.examples.len() as i64 + 1;
        state.examples.push(Example {
            id,
            question: question.to_string(),
            sql: sql.to_string(),
            category,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn bump_concept_usage(&self, ids: &[i64]) -> Result<(), StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().unwrap();
        for c in state.concepts.iter_mut() {
            if ids.contains(&c.id) {
                c.usage_count += 1;
            }
        }
        Ok(())
    }

    async fn record_pattern_outcome(
        &self,
        pattern_id: i64,
        success: bool,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state.patterns.iter_mut().find(|p| p.id == pattern_id) {
            if success {
                p.success_count += 1;
            } else {
                p.failure_count += 1;
            }
        }
        Ok(())
    }

    async fn learned_rules(&self) -> Result<Vec<LearnedRule>, StoreError> {
        self.learned_rule_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().learned_rules.clone())
    }

    async fn insert_learned_rule(
        &self,
        kind: RuleKind,
        pattern: &str,
        correction: &str,
        occurrences: i64,
        active: bool,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().unwrap();
        let id = state.learned_rules.len() as i64 + 1;
        state.learned_rules.push(LearnedRule {
            id,
            kind,
            pattern: pattern.to_string(),
            correction: correction.to_string(),
            occurrences,
            active,
        });
        Ok(())
    }

    async fn upsert_error_pattern(
        &self,
        signature: &str,
        category: ErrorCategory,
        context: &str,
    ) -> Result<i64, StoreError> {
        self.check_write()?;
        let mut state = self.state.lock().unwrap();
        if let Some(p) = state
            .error_patterns
            .iter_mut()
            .find(|p| p.signature == signature)
        {
            p.occurrences += 1;
            p.example_context = context.to_string();
            p.last_seen = Utc::now();
            return Ok(p.occurrences);
        }
        let id = state.error_patterns.len() as i64 + 1;
        state.error_patterns.push(ErrorPattern {
            id,
            signature: signature.to_string(),
            category,
            occurrences: 1,
            example_context: context.to_string(),
            last_seen: Utc::now(),
        });
        Ok(1)
    }

    async fn insert_execution_record(&self, record: ExecutionRecord) -> Result<(), StoreError> {
        self.check_write()?;
        self.state.lock().unwrap().execution_records.push(record);
        Ok(())
    }

    async fn catalog_counts(&self) -> Result<CatalogCounts, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(CatalogCounts {
            concepts: state.concepts.len(),
            tables: state.tables.len(),
            patterns: state.patterns.len(),
            rules: state.rules.len(),
        })
    }
}

/// Scripted [`CompletionClient`]: returns queued responses in order and
/// records which tier each call asked for.
pub struct MockCompletion {
    responses: Mutex<VecDeque<String>>,
    tiers: Arc<Mutex<Vec<ModelTier>>>,
}

impl MockCompletion {
    pub fn returning(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            tiers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn tiers(&self) -> Arc<Mutex<Vec<ModelTier>>> {
        Arc::clone(&self.tiers)
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.tiers.lock().unwrap().push(request.tier);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::ResponseError("no scripted response left".to_string()))
    }
}

/// Scripted [`Warehouse`]: plays back a list of outcomes and records every
/// SQL string it was asked to run.
pub struct ScriptedWarehouse {
    outcomes: Mutex<VecDeque<Result<Vec<serde_json::Value>, String>>>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedWarehouse {
    pub fn new(outcomes: Vec<Result<Vec<serde_json::Value>, String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            executed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn executed(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.executed)
    }
}

#[async_trait]
impl Warehouse for ScriptedWarehouse {
    async fn execute(&self, sql: &str) -> Result<QueryRows, WarehouseError> {
        self.executed.lock().unwrap().push(sql.to_string());
        let next = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("scripted warehouse exhausted".to_string()));
        match next {
            Ok(rows) => {
                let columns = rows
                    .first()
                    .and_then(|row| row.as_object())
                    .map(|object| object.keys().cloned().collect())
                    .unwrap_or_default();
                Ok(QueryRows { columns, rows })
            }
            Err(message) => Err(WarehouseError::Query(message)),
        }
    }
}

/// In-memory [`ConversationStore`].
pub struct MemoryConversations {
    messages: Mutex<Vec<ConversationMessage>>,
}

impl MemoryConversations {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryConversations {
    async fn append(&self, message: ConversationMessage) -> Result<(), StoreError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    async fn recent(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, StoreError> {
        let messages = self.messages.lock().unwrap();
        let session: Vec<ConversationMessage> = messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        let skip = session.len().saturating_sub(limit);
        Ok(session.into_iter().skip(skip).collect())
    }
}
