//! DuckDB warehouse client. Each call is atomic and stateless from the
//! pipeline's perspective: one SQL string in, ordered JSON rows or a typed
//! error out.

use async_trait::async_trait;
use duckdb::types::ValueRef;
use r2d2::Pool;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::db::DuckConnectionManager;

#[derive(Debug)]
pub enum WarehouseError {
    Pool(String),
    Query(String),
    Timeout(u64),
}

impl fmt::Display for WarehouseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarehouseError::Pool(msg) => write!(f, "warehouse pool error: {}", msg),
            WarehouseError::Query(msg) => write!(f, "{}", msg),
            WarehouseError::Timeout(secs) => {
                write!(f, "query timed out after {}s", secs)
            }
        }
    }
}

impl Error for WarehouseError {}

#[derive(Debug)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryRows, WarehouseError>;
}

/// The fixed analytical schema; created empty when missing so a fresh
/// deployment serves queries instead of binder errors.
const WAREHOUSE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS ad_sales (
    sale_id BIGINT,
    sale_date DATE,
    sale_month INTEGER,
    sale_year INTEGER,
    publisher VARCHAR,
    campaign VARCHAR,
    product_id BIGINT,
    amount DOUBLE,
    quantity INTEGER
);
CREATE TABLE IF NOT EXISTS products (
    product_id BIGINT,
    product_name VARCHAR,
    format VARCHAR,
    category VARCHAR,
    unit_price DOUBLE
);
"#;

pub struct DuckWarehouse {
    pool: Pool<DuckConnectionManager>,
    query_timeout: Duration,
}

impl DuckWarehouse {
    pub fn new(pool: Pool<DuckConnectionManager>, query_timeout_secs: u64) -> Self {
        Self {
            pool,
            query_timeout: Duration::from_secs(query_timeout_secs),
        }
    }

    pub async fn bootstrap(&self) -> Result<(), WarehouseError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| WarehouseError::Pool(e.to_string()))?;
            conn.execute_batch(WAREHOUSE_DDL)
                .map_err(|e| WarehouseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| WarehouseError::Query(e.to_string()))?
    }
}

#[async_trait]
impl Warehouse for DuckWarehouse {
    async fn execute(&self, sql: &str) -> Result<QueryRows, WarehouseError> {
        debug!("executing warehouse query: {}", sql);
        let pool = self.pool.clone();
        let sql = sql.to_string();
        let timeout_secs = self.query_timeout.as_secs();

        let task = tokio::task::spawn_blocking(move || -> Result<QueryRows, WarehouseError> {
            let conn = pool.get().map_err(|e| WarehouseError::Pool(e.to_string()))?;
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| WarehouseError::Query(e.to_string()))?;

            let mut rows = stmt
                .query([])
                .map_err(|e| WarehouseError::Query(e.to_string()))?;

            // Column metadata only exists once the statement has run;
            // reading it off a freshly prepared statement panics.
            let columns = match rows.as_ref() {
                Some(executed) => {
                    let column_count = executed.column_count();
                    let mut names = Vec::with_capacity(column_count);
                    for i in 0..column_count {
                        match executed.column_name(i) {
                            Ok(name) => names.push(name.to_string()),
                            Err(_) => names.push(format!("column_{}", i)),
                        }
                    }
                    names
                }
                None => Vec::new(),
            };
            let column_count = columns.len();

            let mut out = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| WarehouseError::Query(e.to_string()))?
            {
                let mut object = serde_json::Map::with_capacity(column_count);
                for (i, name) in columns.iter().enumerate() {
                    object.insert(name.clone(), cell_to_json(row, i));
                }
                out.push(serde_json::Value::Object(object));
            }

            Ok(QueryRows { columns, rows: out })
        });

        match tokio::time::timeout(self.query_timeout, task).await {
            Ok(joined) => joined.map_err(|e| WarehouseError::Query(e.to_string()))?,
            Err(_) => Err(WarehouseError::Timeout(timeout_secs)),
        }
    }
}

/// Maps one DuckDB cell to JSON, falling back to the string rendering for
/// types without a direct JSON counterpart.
fn cell_to_json(row: &duckdb::Row<'_>, idx: usize) -> serde_json::Value {
    match row.get_ref(idx) {
        Ok(ValueRef::Null) => serde_json::Value::Null,
        Ok(ValueRef::Boolean(b)) => serde_json::Value::Bool(b),
        Ok(ValueRef::TinyInt(n)) => serde_json::Value::from(n),
        Ok(ValueRef::SmallInt(n)) => serde_json::Value::from(n),
        Ok(ValueRef::Int(n)) => serde_json::Value::from(n),
        Ok(ValueRef::BigInt(n)) => serde_json::Value::from(n),
        Ok(ValueRef::Float(n)) => serde_json::Value::from(n),
        Ok(ValueRef::Double(n)) => serde_json::Value::from(n),
        Ok(ValueRef::Text(t)) => {
            serde_json::Value::String(String::from_utf8_lossy(t).into_owned())
        }
        _ => match row.get::<_, String>(idx) {
            Ok(s) => serde_json::Value::String(s),
            Err(_) => serde_json::Value::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn temp_db_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("sqlpilot-{}-{}.db", tag, std::process::id()))
    }

    #[tokio::test]
    async fn real_warehouse_returns_column_names_and_json_rows() {
        let path = temp_db_path("warehouse-select");
        let _ = std::fs::remove_file(&path);
        let pool = db::build_pool(path.to_str().unwrap(), 2).unwrap();
        let warehouse = DuckWarehouse::new(pool, 30);
        warehouse.bootstrap().await.unwrap();

        let result = warehouse
            .execute("SELECT 1 AS one, 'banner' AS label")
            .await
            .unwrap();
        assert_eq!(
            result.columns,
            vec!["one".to_string(), "label".to_string()]
        );
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0]["one"], serde_json::json!(1));
        assert_eq!(result.rows[0]["label"], serde_json::json!("banner"));

        // Zero rows must still carry the column metadata.
        let empty = warehouse
            .execute("SELECT publisher, amount FROM ad_sales")
            .await
            .unwrap();
        assert_eq!(
            empty.columns,
            vec!["publisher".to_string(), "amount".to_string()]
        );
        assert!(empty.rows.is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn bad_sql_is_a_query_error_not_a_panic() {
        let path = temp_db_path("warehouse-binder");
        let _ = std::fs::remove_file(&path);
        let pool = db::build_pool(path.to_str().unwrap(), 2).unwrap();
        let warehouse = DuckWarehouse::new(pool, 30);
        warehouse.bootstrap().await.unwrap();

        let err = warehouse
            .execute("SELECT impressions FROM ad_sales")
            .await
            .unwrap_err();
        match err {
            WarehouseError::Query(msg) => assert!(msg.contains("impressions"), "{}", msg),
            other => panic!("expected a query error, got {}", other),
        }

        let _ = std::fs::remove_file(&path);
    }
}
