//! `GET /health` — the readiness gate every other endpoint ignores.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.readiness.snapshot();
    if !snapshot.complete {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "initializing"})),
        );
    }
    if let Some(error) = snapshot.error {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unhealthy", "message": error})),
        );
    }
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}
