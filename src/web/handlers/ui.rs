use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use crate::web::state::AppState;
use crate::web::static_files::get_embedded_file;
use crate::web::templates::render_error;

pub async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    match get_embedded_file("index.html") {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(render_error(
                &state.template_env,
                "500 Internal Server Error",
                "index.html is missing from the build",
                None,
            )),
        )
            .into_response(),
    }
}

pub async fn not_found_handler(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(render_error(
            &state.template_env,
            "404 Not Found",
            "There is nothing at this address.",
            None,
        )),
    )
        .into_response()
}
