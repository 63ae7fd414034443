use duckdb::Connection;
use r2d2::{ManageConnection, Pool};

/// r2d2 connection manager for a DuckDB database file.
pub struct DuckConnectionManager {
    path: String,
}

impl DuckConnectionManager {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl ManageConnection for DuckConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        Connection::open(&self.path)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

pub fn build_pool(path: &str, size: u32) -> Result<Pool<DuckConnectionManager>, r2d2::Error> {
    Pool::builder()
        .max_size(size)
        .build(DuckConnectionManager::new(path))
}
