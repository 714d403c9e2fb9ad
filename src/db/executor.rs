use r2d2::{ManageConnection, Pool, PooledConnection};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::ExecutionError;

/// One result row, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// Rows and column names as read from a warehouse connection.
#[derive(Debug, Default)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

/// Makes column names usable as row keys: a repeated name gets a
/// `_2`, `_3`, ... suffix that no other column already uses.
pub fn unique_columns<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let names: Vec<String> = names.into_iter().collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());

    for (i, name) in names.iter().enumerate() {
        let mut candidate = name.clone();
        let mut n = 2;
        while taken.contains(&candidate)
            || (candidate != *name && names[i + 1..].contains(&candidate))
        {
            candidate = format!("{}_{}", name, n);
            n += 1;
        }
        if candidate != *name {
            debug!("Renamed duplicate column {} to {}", name, candidate);
        }
        taken.insert(candidate.clone());
        columns.push(candidate);
    }

    columns
}

/// Anything that can run a statement and hand back every row.
pub trait WarehouseConnection {
    fn fetch_all(&mut self, sql: &str) -> Result<QueryOutput, ExecutionError>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    pub row_count: usize,
    pub elapsed_seconds: f64,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(columns: Vec<String>, rows: Vec<Record>, elapsed_seconds: f64) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            elapsed_seconds,
            error: None,
        }
    }

    pub fn failure(error: &ExecutionError, elapsed_seconds: f64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            elapsed_seconds,
            error: Some(error.to_string()),
        }
    }

}

/// Paired checkout/checkin counts for a pool.
#[derive(Debug, Default)]
pub struct PoolStats {
    checkouts: AtomicU64,
    checkins: AtomicU64,
}

impl PoolStats {
    pub fn checkouts(&self) -> u64 {
        self.checkouts.load(Ordering::SeqCst)
    }

    pub fn checkins(&self) -> u64 {
        self.checkins.load(Ordering::SeqCst)
    }

    pub fn outstanding(&self) -> u64 {
        self.checkouts().saturating_sub(self.checkins())
    }
}

/// A pooled connection that records its return to the pool when dropped.
pub struct CheckedOut<M: ManageConnection> {
    conn: PooledConnection<M>,
    stats: Arc<PoolStats>,
}

impl<M: ManageConnection> Deref for CheckedOut<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<M: ManageConnection> DerefMut for CheckedOut<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl<M: ManageConnection> Drop for CheckedOut<M> {
    fn drop(&mut self) {
        self.stats.checkins.fetch_add(1, Ordering::SeqCst);
    }
}

/// Runs statements on a bounded connection pool. Blocking; call it from
/// `spawn_blocking` in async code.
pub struct QueryExecutor<M: ManageConnection> {
    pool: Pool<M>,
    stats: Arc<PoolStats>,
}

impl<M> QueryExecutor<M>
where
    M: ManageConnection,
    M::Connection: WarehouseConnection,
{
    pub fn new(pool: Pool<M>) -> Self {
        Self {
            pool,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn pool(&self) -> &Pool<M> {
        &self.pool
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    pub fn checkout(&self) -> Result<CheckedOut<M>, ExecutionError> {
        let conn = self.pool.get().map_err(|e| {
            warn!("Failed to get warehouse connection: {}", e);
            ExecutionError::Connection(e.to_string())
        })?;
        self.stats.checkouts.fetch_add(1, Ordering::SeqCst);

        Ok(CheckedOut {
            conn,
            stats: Arc::clone(&self.stats),
        })
    }

    /// Single attempt; failures come back in `ExecutionResult::error`.
    pub fn execute(&self, sql: &str) -> ExecutionResult {
        let start_time = Instant::now();
        debug!("Executing SQL: {}", sql);

        let outcome = self
            .checkout()
            .and_then(|mut conn| conn.fetch_all(sql));
        let elapsed = start_time.elapsed().as_secs_f64();

        match outcome {
            Ok(output) => {
                info!(
                    "Query executed successfully. Row count: {}, Execution time: {:.3}s",
                    output.rows.len(),
                    elapsed
                );
                ExecutionResult::success(output.columns, output.rows, elapsed)
            }
            Err(e) => {
                warn!("Query failed after {:.3}s: {}", elapsed, e);
                ExecutionResult::failure(&e, elapsed)
            }
        }
    }

    pub fn ping(&self) -> Result<(), ExecutionError> {
        let mut conn = self.checkout()?;
        conn.fetch_all("SELECT 1").map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedshiftCredentials;
    use crate::db::db_pool::demo_pool;
    use crate::db::redshift::RedshiftConnectionManager;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn executor() -> QueryExecutor<crate::db::db_pool::DuckDBConnectionManager> {
        QueryExecutor::new(demo_pool(2).unwrap())
    }

    #[test]
    fn invalid_sql_sets_error_and_returns_the_connection() {
        let executor = executor();
        let result = executor.execute("SELEC nonsense FROM");

        assert!(result.error.is_some());
        assert_eq!(result.row_count, 0);
        assert!(result.rows.is_empty());
        assert_eq!(executor.stats().checkouts(), 1);
        assert_eq!(executor.stats().checkins(), 1);

        let state = executor.pool().state();
        assert_eq!(state.idle_connections, state.connections);
    }

    #[test]
    fn rows_are_keyed_by_column() {
        let executor = executor();
        let result = executor.execute(
            "SELECT filing_state, COUNT(*) AS companies FROM bi.companies GROUP BY filing_state ORDER BY filing_state LIMIT 100",
        );

        assert_eq!(result.error, None);
        assert_eq!(result.columns, vec!["filing_state", "companies"]);
        assert_eq!(result.row_count, result.rows.len());
        assert!(result.row_count > 0);
        for row in &result.rows {
            let keys: Vec<&String> = row.keys().collect();
            assert_eq!(keys.len(), 2);
            assert!(row["companies"].is_number());
            assert!(row["filing_state"].is_string());
        }
        assert!(result.elapsed_seconds >= 0.0);
    }

    #[test]
    fn empty_results_keep_their_columns() {
        let executor = executor();
        let result = executor.execute("SELECT id, name FROM bi.companies WHERE 1 = 0 LIMIT 10");

        assert_eq!(result.error, None);
        assert_eq!(result.columns, vec!["id", "name"]);
        assert_eq!(result.row_count, 0);
    }

    #[test]
    fn repeated_column_names_get_suffixes() {
        let executor = executor();
        let result = executor.execute("SELECT 1 AS a, 2 AS a, 3 AS a_2");

        assert_eq!(result.error, None);
        assert_eq!(result.columns, vec!["a", "a_3", "a_2"]);
        let row = &result.rows[0];
        assert_eq!(row.len(), result.columns.len());
        assert_eq!(row["a"], serde_json::json!(1));
        assert_eq!(row["a_3"], serde_json::json!(2));
        assert_eq!(row["a_2"], serde_json::json!(3));
    }

    #[test]
    fn joined_tables_keep_every_column() {
        let executor = executor();
        let result = executor.execute(
            "SELECT c.id, c.name, d.name FROM bi.companies c \
             JOIN bi.credit_delinquencies d ON d.company_id = c.id LIMIT 3",
        );

        assert_eq!(result.error, None);
        assert_eq!(result.columns, vec!["id", "name", "name_2"]);
        for row in &result.rows {
            let keys: Vec<&String> = row.keys().collect();
            assert_eq!(keys.len(), result.columns.len());
        }
    }

    #[test]
    fn unique_columns_leaves_distinct_names_alone() {
        let names = vec!["month".to_string(), "volume".to_string()];
        assert_eq!(unique_columns(names.clone()), names);
        assert_eq!(
            unique_columns(["x", "x", "x"].map(String::from)),
            vec!["x", "x_2", "x_3"]
        );
    }

    #[test]
    fn unreachable_warehouse_is_a_connection_error() {
        let credentials = RedshiftCredentials {
            host: "127.0.0.1".to_string(),
            port: 1,
            database: "analytics".to_string(),
            username: "analyst".to_string(),
            password: "secret".to_string(),
        };
        let manager = RedshiftConnectionManager::new(&credentials, Duration::from_secs(1));
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .connection_timeout(Duration::from_secs(1))
            .build_unchecked(manager);
        let executor = QueryExecutor::new(pool);

        let result = executor.execute("SELECT 1");

        let error = result.error.unwrap();
        assert!(error.starts_with("Database connection failed"), "{error}");
        assert_eq!(result.row_count, 0);
        assert!(result.columns.is_empty());
        assert_eq!(executor.stats().checkouts(), executor.stats().checkins());
        assert!(executor.ping().is_err());
    }

    #[test]
    fn counts_stay_paired_across_calls() {
        let executor = executor();
        executor.execute("SELECT 1");
        executor.execute("SELECT * FROM missing_table");
        executor.ping().unwrap();

        assert_eq!(executor.stats().checkouts(), 3);
        assert_eq!(executor.stats().outstanding(), 0);
    }
}
