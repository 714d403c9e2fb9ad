pub mod db_pool;
pub mod executor;
pub mod redshift;
pub mod schema_registry;
pub mod status;

use r2d2::Pool;
use tracing::info;

use crate::config::{WarehouseConfig, WarehouseMode};
use crate::db::db_pool::{demo_pool, DuckDBConnectionManager};
use crate::db::executor::{ExecutionResult, QueryExecutor};
use crate::db::redshift::RedshiftConnectionManager;
use crate::error::ExecutionError;

/// The warehouse selected at startup.
pub enum Warehouse {
    Redshift(QueryExecutor<RedshiftConnectionManager>),
    Demo(QueryExecutor<DuckDBConnectionManager>),
}

impl Warehouse {
    pub fn from_config(config: &WarehouseConfig) -> Result<Self, Box<dyn std::error::Error>> {
        match config.resolved_mode() {
            WarehouseMode::Redshift => {
                let credentials = config.credentials()?;
                info!(
                    "Initializing Redshift connection pool for {}:{}/{}",
                    credentials.host, credentials.port, credentials.database
                );
                let manager = RedshiftConnectionManager::new(&credentials, config.connect_timeout());
                // Unchecked so startup succeeds off-VPN; the status panel reports reachability
                let pool = Pool::builder()
                    .max_size(config.pool_size.max(1))
                    .min_idle(Some(0))
                    .connection_timeout(config.connect_timeout())
                    .build_unchecked(manager);
                Ok(Warehouse::Redshift(QueryExecutor::new(pool)))
            }
            WarehouseMode::Demo | WarehouseMode::Auto => {
                let pool = demo_pool(config.pool_size)?;
                Ok(Warehouse::Demo(QueryExecutor::new(pool)))
            }
        }
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, Warehouse::Demo(_))
    }

    pub fn execute(&self, sql: &str) -> ExecutionResult {
        match self {
            Warehouse::Redshift(executor) => executor.execute(sql),
            Warehouse::Demo(executor) => executor.execute(sql),
        }
    }

    pub fn ping(&self) -> Result<(), ExecutionError> {
        match self {
            Warehouse::Redshift(executor) => executor.ping(),
            Warehouse::Demo(executor) => executor.ping(),
        }
    }
}
