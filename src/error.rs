use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Maximum of {0} hints per question reached")]
    HintsExhausted(u32),

    #[error("Hints are not available in {0} mode")]
    HintsDisabled(String),

    #[error("Inference server unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::BadRequest(_) => "bad_request",
            Error::NotFound(_) => "not_found",
            Error::InvalidState(_) => "invalid_state",
            Error::HintsExhausted(_) => "hints_exhausted",
            Error::HintsDisabled(_) => "hints_disabled",
            Error::InferenceUnavailable(_) => "inference_unavailable",
            Error::MalformedResponse(_) => "malformed_response",
            Error::Generation(_) => "generation_error",
            Error::Database(_) => "database_error",
            Error::Migrate(_) => "database_error",
            Error::Validation(_) => "validation_error",
            Error::Json(_) => "bad_request",
            Error::Internal(_) => "internal_error",
            Error::Io(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let kind = self.kind();
        let (status, message) = match &self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::InvalidState(msg) => (StatusCode::CONFLICT, msg.clone()),
            Error::HintsExhausted(_) | Error::HintsDisabled(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::InferenceUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The language model service is currently unavailable".to_string(),
            ),
            Error::MalformedResponse(_) | Error::Generation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "The language model returned an unusable response".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({ "error": kind, "message": message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: Error) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn maps_exam_errors_to_status_codes() {
        let (status, body) = render(Error::NotFound("Exam not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert_eq!(body["message"], "Exam not found");

        let (status, body) = render(Error::InvalidState("Exam already completed".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "invalid_state");

        let (status, body) = render(Error::HintsExhausted(3)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "hints_exhausted");

        let (status, _) = render(Error::HintsDisabled("timed".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = render(Error::InferenceUnavailable("timeout".into())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn hides_model_output_from_clients() {
        let (status, body) =
            render(Error::Generation("raw model text: {not json".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "generation_error");
        assert!(!body["message"].as_str().unwrap().contains("raw model text"));
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
