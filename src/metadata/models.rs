use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What part of the warehouse schema a concept resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Column,
    Table,
    Entity,
    Expression,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Column => "column",
            TargetKind::Table => "table",
            TargetKind::Entity => "entity",
            TargetKind::Expression => "expression",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "column" => Some(TargetKind::Column),
            "table" => Some(TargetKind::Table),
            "entity" => Some(TargetKind::Entity),
            "expression" => Some(TargetKind::Expression),
            _ => None,
        }
    }
}

/// A curated multilingual term mapped to a schema target. At least one
/// language term is non-null; the usage counter is bumped on every match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: i64,
    pub term_en: Option<String>,
    pub term_es: Option<String>,
    pub target_kind: TargetKind,
    /// Schema target: "table.column" for columns/entities, a table name,
    /// or a formula body for expressions.
    pub target: String,
    pub priority: i32,
    pub usage_count: i64,
    pub active: bool,
}

impl Concept {
    /// All non-null terms for this concept.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.term_en
            .as_deref()
            .into_iter()
            .chain(self.term_es.as_deref())
    }

    /// Preferred display name for prompts.
    pub fn display_term(&self) -> &str {
        self.term_en
            .as_deref()
            .or(self.term_es.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: String,
    pub description: String,
    pub is_key: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinHint {
    pub target_table: String,
    pub join_kind: String,
    pub predicate: String,
}

/// Immutable table description used only for prompt construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub qualified_name: String,
    pub description: String,
    pub columns: Vec<ColumnMeta>,
    pub joins: Vec<JoinHint>,
}

/// Named reusable query shape with a success/failure track record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPattern {
    pub id: i64,
    pub name: String,
    pub intent_keywords: Vec<String>,
    pub intent: String,
    pub sql_template: String,
    pub parameters: Vec<String>,
    pub example_questions: Vec<String>,
    pub success_count: i64,
    pub failure_count: i64,
    pub active: bool,
}

impl QueryPattern {
    /// Historical success rate in [0, 1]; 0 when never executed.
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.0
        } else {
            self.success_count as f64 / total as f64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRule {
    pub id: i64,
    pub name: String,
    pub condition: String,
    /// Schema targets this rule applies to; matched against concept targets.
    pub entity_kinds: Vec<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    AutoSuccess,
    UserPositive,
    UserNegative,
    AutoFailure,
}

impl FeedbackCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackCategory::AutoSuccess => "auto_success",
            FeedbackCategory::UserPositive => "user_positive",
            FeedbackCategory::UserNegative => "user_negative",
            FeedbackCategory::AutoFailure => "auto_failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto_success" => Some(FeedbackCategory::AutoSuccess),
            "user_positive" => Some(FeedbackCategory::UserPositive),
            "user_negative" => Some(FeedbackCategory::UserNegative),
            "auto_failure" => Some(FeedbackCategory::AutoFailure),
            _ => None,
        }
    }
}

/// A previously generated (question, SQL) pair used for few-shot retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub id: i64,
    pub question: String,
    pub sql: String,
    pub category: FeedbackCategory,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ColumnFix,
    PatternFix,
    PromptHint,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::ColumnFix => "column_fix",
            RuleKind::PatternFix => "pattern_fix",
            RuleKind::PromptHint => "prompt_hint",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "column_fix" => Some(RuleKind::ColumnFix),
            "pattern_fix" => Some(RuleKind::PatternFix),
            "prompt_hint" => Some(RuleKind::PromptHint),
            _ => None,
        }
    }
}

/// A (pattern, correction) substitution promoted from a repeated error
/// signature. Only rules with `active` set are applied by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedRule {
    pub id: i64,
    pub kind: RuleKind,
    pub pattern: String,
    pub correction: String,
    pub occurrences: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Column,
    Syntax,
    Table,
    Semantic,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Column => "column",
            ErrorCategory::Syntax => "syntax",
            ErrorCategory::Table => "table",
            ErrorCategory::Semantic => "semantic",
        }
    }
}

/// Normalized signature of a failure message and how often it was seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub id: i64,
    pub signature: String,
    pub category: ErrorCategory,
    pub occurrences: i64,
    pub example_context: String,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
    Timeout,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
            Outcome::Timeout => "timeout",
        }
    }
}

/// One row per SQL execution attempt; append-only audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub question: String,
    pub sql: String,
    pub outcome: Outcome,
    pub row_count: Option<usize>,
    pub error: Option<String>,
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// Ordered per-session message; a session's memory window is the most
/// recent N of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub sql: Option<String>,
    pub result_snapshot: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
