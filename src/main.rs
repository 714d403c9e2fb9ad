use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod db;
mod error;
mod llm;
mod util;
mod viz;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::schema_registry::SchemaRegistry;
use crate::db::Warehouse;
use crate::llm::generator::SqlGenerator;
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(false);
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize logging
    init_tracing(config.production_mode);

    let registry = Arc::new(SchemaRegistry::warehouse());

    let warehouse = Warehouse::from_config(&config.warehouse)?;
    if warehouse.is_demo() {
        info!("Running against the demo warehouse");
    }

    // AI generation is optional; templates cover the rest
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = match LlmManager::new(&config.llm) {
        Ok(manager) => manager,
        Err(e) => {
            warn!("AI query generation disabled: {}", e);
            None
        }
    };

    let generator = SqlGenerator::new(llm_manager, Arc::clone(&registry), config.warehouse.row_limit);
    let app_state = Arc::new(AppState::new(config.clone(), warehouse, generator, registry)?);

    // Warm the status cache so the first page load is fast
    let status = app_state.system_status().await;
    for hint in &status.hints {
        info!("Status: {}", hint);
    }

    // Start the web server
    info!("Starting Warehouse Analyst on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
