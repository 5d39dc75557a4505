pub mod catalog;
pub mod exam;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::middleware::{cors::cors_layer, rate_limit};
use crate::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Full application router. Model-backed routes sit behind the LLM rate limit.
pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let llm_routes = Router::new()
        .route("/exam/start", post(exam::start_exam))
        .route("/exam/answer", post(exam::submit_answer))
        .route("/exam/hint", post(exam::request_hint))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::LlmRateLimiter::new(config.llm_rps),
            rate_limit::llm_rate_limit,
        ));

    let read_routes = Router::new()
        .route("/exam/:id", get(exam::get_exam))
        .route("/exams", get(exam::list_exams))
        .route("/topics", get(catalog::list_topics))
        .route("/health", get(health::health));

    Router::new()
        .merge(llm_routes)
        .merge(read_routes)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
