use minijinja::Environment;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::executor::ExecutionResult;
use crate::db::schema_registry::SchemaRegistry;
use crate::db::status::{StatusCache, SystemStatus};
use crate::db::Warehouse;
use crate::error::{ConfigurationError, ExecutionError};
use crate::llm::generator::SqlGenerator;
use crate::util::network::NetworkGate;
use crate::web::templates::init_templates;

const VPN_HINT: &str = "Connect to VPN to access real data";

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub warehouse: Arc<Warehouse>,
    pub generator: SqlGenerator,
    pub registry: Arc<SchemaRegistry>,
    pub status: StatusCache,
    pub gate: NetworkGate,
    pub template_env: Environment<'static>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        warehouse: Warehouse,
        generator: SqlGenerator,
        registry: Arc<SchemaRegistry>,
    ) -> Result<Self, minijinja::Error> {
        Ok(Self {
            status: StatusCache::new(config.status_ttl()),
            gate: NetworkGate::from_config(&config.network),
            template_env: init_templates()?,
            warehouse: Arc::new(warehouse),
            generator,
            registry,
            config,
        })
    }

    /// Runs a statement on the blocking pool. Never fails; errors land in
    /// the result.
    pub async fn run_query(&self, sql: String) -> ExecutionResult {
        let warehouse = Arc::clone(&self.warehouse);
        match tokio::task::spawn_blocking(move || warehouse.execute(&sql)).await {
            Ok(result) => result,
            Err(e) => ExecutionResult::failure(
                &ExecutionError::Query(format!("Query task failed: {}", e)),
                0.0,
            ),
        }
    }

    pub async fn system_status(&self) -> SystemStatus {
        self.status.get_or_refresh(|| self.probe()).await
    }

    pub async fn refresh_status(&self) -> SystemStatus {
        self.status.invalidate().await;
        self.system_status().await
    }

    async fn probe(&self) -> SystemStatus {
        let mut hints = Vec::new();
        let demo_mode = self.warehouse.is_demo();

        let warehouse_configured = match self.config.warehouse.credentials() {
            Ok(_) => true,
            Err(e) => {
                if !demo_mode {
                    warn!("{}", e);
                }
                hints.push(e.hint().to_string());
                false
            }
        };

        let warehouse = Arc::clone(&self.warehouse);
        let warehouse_accessible = match tokio::task::spawn_blocking(move || warehouse.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Warehouse status check failed: {}", e);
                hints.push(VPN_HINT.to_string());
                false
            }
            Err(e) => {
                warn!("Warehouse status check did not complete: {}", e);
                false
            }
        };

        let llm_configured = self.generator.has_ai();
        if !llm_configured {
            hints.push(
                ConfigurationError::MissingLlmCredentials("OPENAI_API_KEY".to_string())
                    .hint()
                    .to_string(),
            );
        }

        info!(
            "System status: warehouse configured={} accessible={} demo={} llm={}",
            warehouse_configured, warehouse_accessible, demo_mode, llm_configured
        );

        SystemStatus {
            warehouse_configured,
            warehouse_accessible,
            llm_configured,
            demo_mode,
            network_gate_enforced: self.gate.is_enforced(),
            hints,
            checked_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{CliArgs, WarehouseConfig, WarehouseMode};

    pub(crate) fn demo_state() -> AppState {
        let args = CliArgs {
            demo: true,
            ..CliArgs::default()
        };
        let mut config = AppConfig::load(&args, |_| None).unwrap();
        config.warehouse = WarehouseConfig {
            mode: WarehouseMode::Demo,
            pool_size: 2,
            ..WarehouseConfig::default()
        };
        let registry = Arc::new(SchemaRegistry::warehouse());
        let warehouse = Warehouse::from_config(&config.warehouse).unwrap();
        let generator = SqlGenerator::new(None, Arc::clone(&registry), config.warehouse.row_limit);
        AppState::new(config, warehouse, generator, registry).unwrap()
    }

    #[tokio::test]
    async fn demo_status_reports_reachable_warehouse_and_hints() {
        let state = demo_state();
        let status = state.system_status().await;

        assert!(status.demo_mode);
        assert!(status.warehouse_accessible);
        assert!(!status.warehouse_configured);
        assert!(!status.llm_configured);
        assert!(!status.network_gate_enforced);
        assert_eq!(
            status.hints,
            vec![
                "Set up database credentials to access real data".to_string(),
                "Set OPENAI_API_KEY to enable AI query generation".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn queries_run_off_the_async_runtime() {
        let state = demo_state();
        let result = state.run_query("SELECT COUNT(*) AS n FROM bi.penalty_cases".to_string()).await;
        assert_eq!(result.error, None);
        assert_eq!(result.rows[0]["n"], serde_json::json!(10));
    }
}
