use axum::response::Json;

use crate::dto::catalog_dto::TopicsResponse;

#[axum::debug_handler]
pub async fn list_topics() -> Json<TopicsResponse> {
    Json(TopicsResponse::catalog())
}
