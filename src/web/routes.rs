use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::static_files::static_handler;
use super::state::AppState;

// UI Routes - web interface
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::ui::index_handler))
        .route("/static/{*path}", get(static_handler))
}

// API Routes - JSON endpoints used by the page
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Query endpoints
            .route("/nl-query", post(handlers::api::nl_query))
            .route("/query", post(handlers::api::execute_query))
            // Data export
            .route("/export/csv", post(handlers::api::export_csv))
            // Schema
            .route("/schema", get(handlers::api::get_schema))
            // System status
            .route("/status", get(handlers::api::system_status))
            .route("/status/refresh", post(handlers::api::refresh_status)),
    )
}
