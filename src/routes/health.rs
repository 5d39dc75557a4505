use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::AppState;

#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health_service.check().await;
    (StatusCode::OK, Json(report))
}
