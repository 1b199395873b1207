pub mod auth;
pub mod categories;
pub mod posts;
pub mod uploads;

use axum::extract::rejection::JsonRejection;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Slack on top of the image limit for the text parts of a multipart body.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// The full HTTP surface, ready to serve.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.storage.max_image_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/api/health", get(health))
        .merge(auth::router())
        .merge(posts::router())
        .merge(categories::router())
        .merge(uploads::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// Unwrap a JSON body, reporting malformed input in the usual error shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}
