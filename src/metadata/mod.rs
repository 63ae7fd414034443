pub mod client;
pub mod models;
pub mod store;

use async_trait::async_trait;
use std::error::Error;
use std::fmt;

use models::{
    BusinessRule, Concept, ConversationMessage, ErrorCategory, Example, ExecutionRecord,
    FeedbackCategory, LearnedRule, QueryPattern, RuleKind, TableMetadata,
};

#[derive(Debug)]
pub enum StoreError {
    Pool(String),
    Query(String),
    Task(String),
    Decode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Pool(msg) => write!(f, "store pool error: {}", msg),
            StoreError::Query(msg) => write!(f, "store query error: {}", msg),
            StoreError::Task(msg) => write!(f, "store task error: {}", msg),
            StoreError::Decode(msg) => write!(f, "store decode error: {}", msg),
        }
    }
}

impl Error for StoreError {}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CatalogCounts {
    pub concepts: usize,
    pub tables: usize,
    pub patterns: usize,
    pub rules: usize,
}

/// Read access to the reference collections plus the operational
/// learning collections. Reference data is curated; the pipeline only
/// increments counters and appends.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn concepts(&self) -> Result<Vec<Concept>, StoreError>;
    async fn tables(&self) -> Result<Vec<TableMetadata>, StoreError>;
    async fn patterns(&self) -> Result<Vec<QueryPattern>, StoreError>;
    async fn rules(&self) -> Result<Vec<BusinessRule>, StoreError>;
    /// A bounded sample of previously successful examples, newest first.
    async fn successful_examples(&self, limit: usize) -> Result<Vec<Example>, StoreError>;
    async fn insert_example(
        &self,
        question: &str,
        sql: &str,
        category: FeedbackCategory,
    ) -> Result<(), StoreError>;
    async fn bump_concept_usage(&self, ids: &[i64]) -> Result<(), StoreError>;
    async fn record_pattern_outcome(&self, pattern_id: i64, success: bool)
        -> Result<(), StoreError>;
    async fn learned_rules(&self) -> Result<Vec<LearnedRule>, StoreError>;
    async fn insert_learned_rule(
        &self,
        kind: RuleKind,
        pattern: &str,
        correction: &str,
        occurrences: i64,
        active: bool,
    ) -> Result<(), StoreError>;
    /// Creates the pattern with count 1, or increments it and refreshes the
    /// example context. Returns the occurrence count after the upsert.
    async fn upsert_error_pattern(
        &self,
        signature: &str,
        category: ErrorCategory,
        context: &str,
    ) -> Result<i64, StoreError>;
    async fn insert_execution_record(&self, record: ExecutionRecord) -> Result<(), StoreError>;
    async fn catalog_counts(&self) -> Result<CatalogCounts, StoreError>;
}

/// Append-only per-session message log.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append(&self, message: ConversationMessage) -> Result<(), StoreError>;
    /// The most recent `limit` messages of a session, re-ordered to
    /// chronological.
    async fn recent(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, StoreError>;
}
