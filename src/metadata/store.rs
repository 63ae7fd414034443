use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use r2d2::Pool;
use tracing::info;

use crate::db::DuckConnectionManager;
use crate::metadata::models::{
    BusinessRule, ColumnMeta, Concept, ConversationMessage, ErrorCategory, Example,
    ExecutionRecord, FeedbackCategory, JoinHint, LearnedRule, QueryPattern, Role, RuleKind,
    TableMetadata, TargetKind,
};
use crate::metadata::{CatalogCounts, CatalogStore, ConversationStore, StoreError};

/// DuckDB-backed catalog: five reference collections plus the operational
/// learning and conversation collections. All access goes through
/// `spawn_blocking`; connections come from the shared r2d2 pool.
pub struct DuckCatalog {
    pool: Pool<DuckConnectionManager>,
}

const BOOTSTRAP_DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS seq_examples;
CREATE SEQUENCE IF NOT EXISTS seq_learned_rules;
CREATE SEQUENCE IF NOT EXISTS seq_error_patterns;
CREATE SEQUENCE IF NOT EXISTS seq_execution_log;
CREATE SEQUENCE IF NOT EXISTS seq_messages;

CREATE TABLE IF NOT EXISTS concepts (
    id BIGINT PRIMARY KEY,
    term_en TEXT,
    term_es TEXT,
    target_kind TEXT NOT NULL,
    target TEXT NOT NULL,
    priority INTEGER NOT NULL,
    usage_count BIGINT NOT NULL,
    active BOOLEAN NOT NULL
);

CREATE TABLE IF NOT EXISTS catalog_tables (
    name TEXT PRIMARY KEY,
    qualified_name TEXT NOT NULL,
    description TEXT NOT NULL,
    columns TEXT NOT NULL,
    joins TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS query_patterns (
    id BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    intent_keywords TEXT NOT NULL,
    intent TEXT NOT NULL,
    sql_template TEXT NOT NULL,
    parameters TEXT NOT NULL,
    example_questions TEXT NOT NULL,
    success_count BIGINT NOT NULL,
    failure_count BIGINT NOT NULL,
    active BOOLEAN NOT NULL
);

CREATE TABLE IF NOT EXISTS business_rules (
    id BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    condition TEXT NOT NULL,
    entity_kinds TEXT NOT NULL,
    active BOOLEAN NOT NULL
);

CREATE TABLE IF NOT EXISTS examples (
    id BIGINT PRIMARY KEY,
    question TEXT NOT NULL,
    sql TEXT NOT NULL,
    category TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS learned_rules (
    id BIGINT PRIMARY KEY,
    kind TEXT NOT NULL,
    pattern TEXT NOT NULL,
    correction TEXT NOT NULL,
    occurrences BIGINT NOT NULL,
    active BOOLEAN NOT NULL
);

CREATE TABLE IF NOT EXISTS error_patterns (
    id BIGINT PRIMARY KEY,
    signature TEXT NOT NULL,
    category TEXT NOT NULL,
    occurrences BIGINT NOT NULL,
    example_context TEXT NOT NULL,
    last_seen TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS execution_log (
    id BIGINT PRIMARY KEY,
    question TEXT NOT NULL,
    sql TEXT NOT NULL,
    outcome TEXT NOT NULL,
    row_count BIGINT,
    error TEXT,
    latency_ms BIGINT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS conversation_messages (
    id BIGINT PRIMARY KEY,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    sql TEXT,
    result_snapshot TEXT,
    created_at TEXT NOT NULL
);
"#;

impl DuckCatalog {
    pub fn new(pool: Pool<DuckConnectionManager>) -> Self {
        Self { pool }
    }

    /// Creates the catalog tables and seeds the curated reference data on
    /// first run.
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(BOOTSTRAP_DDL)
                .map_err(|e| StoreError::Query(e.to_string()))?;

            let concept_count: i64 = conn
                .query_row("SELECT count(*) FROM concepts", [], |row| row.get(0))
                .map_err(|e| StoreError::Query(e.to_string()))?;

            if concept_count == 0 {
                info!("Seeding catalog reference data");
                seed_reference_data(conn)?;
            }
            Ok(())
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| StoreError::Pool(e.to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn query_err(e: duckdb::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

fn decode_json<T: serde::de::DeserializeOwned>(field: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Decode(format!("{}: {}", field, e)))
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("timestamp: {}", e)))
}

#[async_trait]
impl CatalogStore for DuckCatalog {
    async fn concepts(&self) -> Result<Vec<Concept>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, term_en, term_es, target_kind, target, priority, usage_count, active
                     FROM concepts WHERE active ORDER BY priority DESC, id",
                )
                .map_err(query_err)?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i32>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, bool>(7)?,
                    ))
                })
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;

            raw.into_iter()
                .map(|(id, term_en, term_es, kind, target, priority, usage_count, active)| {
                    let target_kind = TargetKind::parse(&kind).ok_or_else(|| {
                        StoreError::Decode(format!("unknown target kind '{}'", kind))
                    })?;
                    Ok(Concept {
                        id,
                        term_en,
                        term_es,
                        target_kind,
                        target,
                        priority,
                        usage_count,
                        active,
                    })
                })
                .collect()
        })
        .await
    }

    async fn tables(&self) -> Result<Vec<TableMetadata>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT name, qualified_name, description, columns, joins
                     FROM catalog_tables ORDER BY name",
                )
                .map_err(query_err)?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;

            raw.into_iter()
                .map(|(name, qualified_name, description, columns, joins)| {
                    let columns: Vec<ColumnMeta> = decode_json("columns", &columns)?;
                    let joins: Vec<JoinHint> = decode_json("joins", &joins)?;
                    Ok(TableMetadata {
                        name,
                        qualified_name,
                        description,
                        columns,
                        joins,
                    })
                })
                .collect()
        })
        .await
    }

    async fn patterns(&self) -> Result<Vec<QueryPattern>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, intent_keywords, intent, sql_template, parameters,
                            example_questions, success_count, failure_count, active
                     FROM query_patterns WHERE active ORDER BY id",
                )
                .map_err(query_err)?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, i64>(8)?,
                        row.get::<_, bool>(9)?,
                    ))
                })
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;

            raw.into_iter()
                .map(
                    |(id, name, kw, intent, sql_template, params_raw, examples, ok, fail, active)| {
                        Ok(QueryPattern {
                            id,
                            name,
                            intent_keywords: decode_json("intent_keywords", &kw)?,
                            intent,
                            sql_template,
                            parameters: decode_json("parameters", &params_raw)?,
                            example_questions: decode_json("example_questions", &examples)?,
                            success_count: ok,
                            failure_count: fail,
                            active,
                        })
                    },
                )
                .collect()
        })
        .await
    }

    async fn rules(&self) -> Result<Vec<BusinessRule>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, condition, entity_kinds, active
                     FROM business_rules WHERE active ORDER BY id",
                )
                .map_err(query_err)?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, bool>(4)?,
                    ))
                })
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;

            raw.into_iter()
                .map(|(id, name, condition, kinds, active)| {
                    Ok(BusinessRule {
                        id,
                        name,
                        condition,
                        entity_kinds: decode_json("entity_kinds", &kinds)?,
                        active,
                    })
                })
                .collect()
        })
        .await
    }

    async fn successful_examples(&self, limit: usize) -> Result<Vec<Example>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, question, sql, category, created_at FROM examples
                     WHERE category IN ('auto_success', 'user_positive')
                     ORDER BY id DESC LIMIT ?",
                )
                .map_err(query_err)?;
            let raw = stmt
                .query_map(params![limit as i64], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;

            raw.into_iter()
                .map(|(id, question, sql, category, created_at)| {
                    let category = FeedbackCategory::parse(&category).ok_or_else(|| {
                        StoreError::Decode(format!("unknown feedback category '{}'", category))
                    })?;
                    Ok(Example {
                        id,
                        question,
                        sql,
                        category,
                        created_at: decode_timestamp(&created_at)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn insert_example(
        &self,
        question: &str,
        sql: &str,
        category: FeedbackCategory,
    ) -> Result<(), StoreError> {
        let question = question.to_string();
        let sql = sql.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO examples (id, question, sql, category, created_at)
                 VALUES (nextval('seq_examples'), ?, ?, ?, ?)",
                params![question, sql, category.as_str(), Utc::now().to_rfc3339()],
            )
            .map_err(query_err)?;
            Ok(())
        })
        .await
    }

    async fn bump_concept_usage(&self, ids: &[i64]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            for id in ids {
                conn.execute(
                    "UPDATE concepts SET usage_count = usage_count + 1 WHERE id = ?",
                    params![id],
                )
                .map_err(query_err)?;
            }
            Ok(())
        })
        .await
    }

    async fn record_pattern_outcome(
        &self,
        pattern_id: i64,
        success: bool,
    ) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let column = if success {
                "success_count"
            } else {
                "failure_count"
            };
            conn.execute(
                &format!(
                    "UPDATE query_patterns SET {} = {} + 1 WHERE id = ?",
                    column, column
                ),
                params![pattern_id],
            )
            .map_err(query_err)?;
            Ok(())
        })
        .await
    }

    async fn learned_rules(&self) -> Result<Vec<LearnedRule>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, kind, pattern, correction, occurrences, active
                     FROM learned_rules ORDER BY id",
                )
                .map_err(query_err)?;
            let raw = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, bool>(5)?,
                    ))
                })
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;

            raw.into_iter()
                .map(|(id, kind, pattern, correction, occurrences, active)| {
                    let kind = RuleKind::parse(&kind).ok_or_else(|| {
                        StoreError::Decode(format!("unknown rule kind '{}'", kind))
                    })?;
                    Ok(LearnedRule {
                        id,
                        kind,
                        pattern,
                        correction,
                        occurrences,
                        active,
                    })
                })
                .collect()
        })
        .await
    }

    async fn insert_learned_rule(
        &self,
        kind: RuleKind,
        pattern: &str,
        correction: &str,
        occurrences: i64,
        active: bool,
    ) -> Result<(), StoreError> {
        let pattern = pattern.to_string();
        let correction = correction.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO learned_rules (id, kind, pattern, correction, occurrences, active)
                 VALUES (nextval('seq_learned_rules'), ?, ?, ?, ?, ?)",
                params![kind.as_str(), pattern, correction, occurrences, active],
            )
            .map_err(query_err)?;
            Ok(())
        })
        .await
    }

    async fn upsert_error_pattern(
        &self,
        signature: &str,
        category: ErrorCategory,
        context: &str,
    ) -> Result<i64, StoreError> {
        let signature = signature.to_string();
        let context = context.to_string();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let existing: Option<(i64, i64)> = match conn.query_row(
                "SELECT id, occurrences FROM error_patterns WHERE signature = ?",
                params![signature],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            ) {
                Ok(found) => Some(found),
                Err(duckdb::Error::QueryReturnedNoRows) => None,
                Err(e) => return Err(query_err(e)),
            };

            match existing {
                Some((id, occurrences)) => {
                    conn.execute(
                        "UPDATE error_patterns
                         SET occurrences = ?, example_context = ?, last_seen = ?
                         WHERE id = ?",
                        params![occurrences + 1, context, now, id],
                    )
                    .map_err(query_err)?;
                    Ok(occurrences + 1)
                }
                None => {
                    conn.execute(
                        "INSERT INTO error_patterns
                            (id, signature, category, occurrences, example_context, last_seen)
                         VALUES (nextval('seq_error_patterns'), ?, ?, 1, ?, ?)",
                        params![signature, category.as_str(), context, now],
                    )
                    .map_err(query_err)?;
                    Ok(1)
                }
            }
        })
        .await
    }

    async fn insert_execution_record(&self, record: ExecutionRecord) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO execution_log
                    (id, question, sql, outcome, row_count, error, latency_ms, created_at)
                 VALUES (nextval('seq_execution_log'), ?, ?, ?, ?, ?, ?, ?)",
                params![
                    record.question,
                    record.sql,
                    record.outcome.as_str(),
                    record.row_count.map(|n| n as i64),
                    record.error,
                    record.latency_ms as i64,
                    record.created_at.to_rfc3339(),
                ],
            )
            .map_err(query_err)?;
            Ok(())
        })
        .await
    }

    async fn catalog_counts(&self) -> Result<CatalogCounts, StoreError> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<usize, StoreError> {
                conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                    .map(|n| n as usize)
                    .map_err(query_err)
            };
            Ok(CatalogCounts {
                concepts: count("SELECT count(*) FROM concepts WHERE active")?,
                tables: count("SELECT count(*) FROM catalog_tables")?,
                patterns: count("SELECT count(*) FROM query_patterns WHERE active")?,
                rules: count("SELECT count(*) FROM business_rules WHERE active")?,
            })
        })
        .await
    }
}

#[async_trait]
impl ConversationStore for DuckCatalog {
    async fn append(&self, message: ConversationMessage) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let snapshot = message
                .result_snapshot
                .as_ref()
                .map(|v| v.to_string());
            conn.execute(
                "INSERT INTO conversation_messages
                    (id, session_id, role, content, sql, result_snapshot, created_at)
                 VALUES (nextval('seq_messages'), ?, ?, ?, ?, ?, ?)",
                params![
                    message.session_id,
                    message.role.as_str(),
                    message.content,
                    message.sql,
                    snapshot,
                    message.created_at.to_rfc3339(),
                ],
            )
            .map_err(query_err)?;
            Ok(())
        })
        .await
    }

    async fn recent(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationMessage>, StoreError> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT session_id, role, content, sql, result_snapshot, created_at
                     FROM conversation_messages WHERE session_id = ?
                     ORDER BY id DESC LIMIT ?",
                )
                .map_err(query_err)?;
            let raw = stmt
                .query_map(params![session_id, limit as i64], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(query_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(query_err)?;

            let mut messages = raw
                .into_iter()
                .map(|(session_id, role, content, sql, snapshot, created_at)| {
                    let role = Role::parse(&role)
                        .ok_or_else(|| StoreError::Decode(format!("unknown role '{}'", role)))?;
                    let result_snapshot = match snapshot {
                        Some(s) => Some(decode_json("result_snapshot", &s)?),
                        None => None,
                    };
                    Ok(ConversationMessage {
                        session_id,
                        role,
                        content,
                        sql,
                        result_snapshot,
                        created_at: decode_timestamp(&created_at)?,
                    })
                })
                .collect::<Result<Vec<_>, StoreError>>()?;

            // The query is newest-first; callers expect chronological.
            messages.reverse();
            Ok(messages)
        })
        .await
    }
}

/// Curated seed: the fixed ad-sales schema, a starter concept vocabulary,
/// three reusable query patterns and the standing business rules.
fn seed_reference_data(conn: &Connection) -> Result<(), StoreError> {
    let concepts: &[(i64, Option<&str>, Option<&str>, &str, &str, i32)] = &[
        (1, Some("revenue"), Some("ingresos"), "column", "ad_sales.amount", 10),
        (2, Some("publisher"), Some("medio"), "column", "ad_sales.publisher", 9),
        (3, Some("campaign"), Some("campana"), "column", "ad_sales.campaign", 8),
        (4, Some("sales"), Some("ventas"), "table", "ad_sales", 8),
        (5, Some("product"), Some("producto"), "table", "products", 9),
        (6, Some("format"), Some("formato"), "column", "products.format", 7),
        (7, Some("category"), Some("categoria"), "column", "products.category", 6),
        (8, Some("quantity"), Some("cantidad"), "column", "ad_sales.quantity", 5),
        (
            9,
            Some("average price"),
            Some("precio medio"),
            "expression",
            "sum(ad_sales.amount) / nullif(sum(ad_sales.quantity), 0)",
            4,
        ),
        (10, Some("month"), Some("mes"), "column", "ad_sales.sale_month", 3),
    ];
    for &(id, en, es, kind, target, priority) in concepts {
        conn.execute(
            "INSERT INTO concepts
                (id, term_en, term_es, target_kind, target, priority, usage_count, active)
             VALUES (?, ?, ?, ?, ?, ?, 0, true)",
            params![id, en, es, kind, target, priority],
        )
        .map_err(query_err)?;
    }

    conn.execute(
        "INSERT INTO catalog_tables (name, qualified_name, description, columns, joins)
         VALUES (?, ?, ?, ?, ?)",
        params![
            "ad_sales",
            "warehouse.main.ad_sales",
            "One row per ad placement sold: date, publisher, campaign, product and the booked amount.",
            r#"[
              {"name":"sale_id","data_type":"BIGINT","description":"Surrogate key","is_key":true},
              {"name":"sale_date","data_type":"DATE","description":"Booking date","is_key":false},
              {"name":"sale_month","data_type":"INTEGER","description":"Booking month 1-12","is_key":false},
              {"name":"sale_year","data_type":"INTEGER","description":"Booking year","is_key":false},
              {"name":"publisher","data_type":"VARCHAR","description":"Publisher / media outlet","is_key":false},
              {"name":"campaign","data_type":"VARCHAR","description":"Campaign name","is_key":false},
              {"name":"product_id","data_type":"BIGINT","description":"FK to products","is_key":false},
              {"name":"amount","data_type":"DOUBLE","description":"Net booked amount","is_key":false},
              {"name":"quantity","data_type":"INTEGER","description":"Units sold","is_key":false}
            ]"#,
            r#"[{"target_table":"products","join_kind":"LEFT JOIN","predicate":"ad_sales.product_id = products.product_id"}]"#,
        ],
    )
    .map_err(query_err)?;

    conn.execute(
        "INSERT INTO catalog_tables (name, qualified_name, description, columns, joins)
         VALUES (?, ?, ?, ?, ?)",
        params![
            "products",
            "warehouse.main.products",
            "Product dimension: one row per sellable ad product.",
            r#"[
              {"name":"product_id","data_type":"BIGINT","description":"Surrogate key","is_key":true},
              {"name":"product_name","data_type":"VARCHAR","description":"Display name","is_key":false},
              {"name":"format","data_type":"VARCHAR","description":"Ad format (banner, video, print...)","is_key":false},
              {"name":"category","data_type":"VARCHAR","description":"Product category","is_key":false},
              {"name":"unit_price","data_type":"DOUBLE","description":"List price per unit","is_key":false}
            ]"#,
            r#"[{"target_table":"ad_sales","join_kind":"LEFT JOIN","predicate":"products.product_id = ad_sales.product_id"}]"#,
        ],
    )
    .map_err(query_err)?;

    let patterns: &[(i64, &str, &str, &str, &str, &str, &str)] = &[
        (
            1,
            "top_n_ranking",
            r#"["top","best","highest","worst","ranking","mejores","peores"]"#,
            "Rank a dimension by an aggregated measure and keep the first N.",
            "SELECT {dimension}, SUM(amount) AS total FROM ad_sales GROUP BY {dimension} ORDER BY total DESC LIMIT {n}",
            r#"["dimension","n"]"#,
            r#"["top 5 publishers by revenue","which campaigns sold best"]"#,
        ),
        (
            2,
            "period_comparison",
            r#"["compare","versus","vs","between","difference","comparar"]"#,
            "Compare an aggregated measure across two time periods side by side.",
            "SELECT sale_month, SUM(amount) AS total FROM ad_sales WHERE sale_month IN ({a}, {b}) AND sale_year = {year} GROUP BY sale_month",
            r#"["a","b","year"]"#,
            r#"["compare revenue between october and november 2024"]"#,
        ),
        (
            3,
            "dimension_breakdown",
            r#"["by","per","breakdown","split","share","por"]"#,
            "Break an aggregated measure down by one dimension.",
            "SELECT {dimension}, SUM(amount) AS total FROM ad_sales GROUP BY {dimension} ORDER BY total DESC",
            r#"["dimension"]"#,
            r#"["revenue by publisher","quantity per format"]"#,
        ),
    ];
    for &(id, name, keywords, intent, template, parameters, examples) in patterns {
        conn.execute(
            "INSERT INTO query_patterns
                (id, name, intent_keywords, intent, sql_template, parameters,
                 example_questions, success_count, failure_count, active)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, true)",
            params![id, name, keywords, intent, template, parameters, examples],
        )
        .map_err(query_err)?;
    }

    let rules: &[(i64, &str, &str, &str)] = &[
        (
            1,
            "net_amounts",
            "amount is net of agency commission; never gross it up",
            r#"["ad_sales.amount"]"#,
        ),
        (
            2,
            "exclude_internal_products",
            "exclude rows where products.category = 'internal'",
            r#"["products","products.format","products.category"]"#,
        ),
    ];
    for &(id, name, condition, kinds) in rules {
        conn.execute(
            "INSERT INTO business_rules (id, name, condition, entity_kinds, active)
             VALUES (?, ?, ?, ?, true)",
            params![id, name, condition, kinds],
        )
        .map_err(query_err)?;
    }

    Ok(())
}
