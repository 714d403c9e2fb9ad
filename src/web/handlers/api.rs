use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::db::executor::ExecutionResult;
use crate::db::schema_registry::SchemaRegistry;
use crate::db::status::SystemStatus;
use crate::error::GenerationError;
use crate::llm::models::GeneratedQuery;
use crate::llm::sanitize::ensure_row_limit;
use crate::viz::{choose_chart, ChartSpec};
use crate::web::state::AppState;

// Request types

#[derive(Debug, Deserialize, Clone)]
pub struct NlQueryRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryRequest {
    pub sql: String,
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub sql: String,
}

// Response types

#[derive(Debug, Serialize)]
pub struct NlQueryResponse {
    pub query: GeneratedQuery,
    pub result: ExecutionResult,
    pub chart: ChartSpec,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub result: ExecutionResult,
    pub chart: ChartSpec,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, message.into())
}

// Natural language question: generate, execute, chart
pub async fn nl_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NlQueryRequest>,
) -> Result<Json<NlQueryResponse>, (StatusCode, String)> {
    debug!("NL-query: {}", payload.question);

    let query = state.generator.generate(&payload.question).await.map_err(|e| match e {
        GenerationError::EmptyQuestion => bad_request("Please enter a question"),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;
    info!("Executing {:?} SQL: {}", query.source, query.sql_text);

    let result = state.run_query(query.sql_text.clone()).await;
    if let Some(e) = &result.error {
        error!("Query failed: {}", e);
    }
    let chart = choose_chart(&query.natural_language_text, &result);

    Ok(Json(NlQueryResponse {
        query,
        result,
        chart,
    }))
}

// Raw (possibly user-edited) SQL
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteQueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    if payload.sql.trim().is_empty() {
        return Err(bad_request("SQL is empty"));
    }

    let sql = ensure_row_limit(&payload.sql, state.generator.row_limit());
    info!("Executing SQL query: {}", sql);

    let result = state.run_query(sql).await;
    let question = payload.question.unwrap_or_default();
    let chart = choose_chart(&question, &result);

    Ok(Json(QueryResponse { result, chart }))
}

pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExportRequest>,
) -> Result<Response, (StatusCode, String)> {
    if payload.sql.trim().is_empty() {
        return Err(bad_request("SQL is empty"));
    }

    let sql = ensure_row_limit(&payload.sql, state.generator.row_limit());
    let result = state.run_query(sql).await;
    if let Some(e) = result.error {
        return Err(bad_request(e));
    }

    let body = to_csv(&result).map_err(|e| {
        error!("CSV export failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("CSV export failed: {}", e))
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"query_results.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

fn csv_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Header row from the result columns, then one record per row.
pub fn to_csv(result: &ExecutionResult) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&result.columns)?;

    for row in &result.rows {
        writer.write_record(result.columns.iter().map(|c| csv_field(row.get(c))))?;
    }

    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    Json(state.system_status().await)
}

pub async fn refresh_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    info!("Status refresh requested");
    Json(state.refresh_status().await)
}

pub async fn get_schema(State(state): State<Arc<AppState>>) -> Json<SchemaRegistry> {
    Json(state.registry.as_ref().clone())
}
