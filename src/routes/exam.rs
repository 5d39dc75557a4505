use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Json, Response},
};

use crate::dto::exam_dto::{HintRequest, StartExamRequest, SubmitAnswerRequest};
use crate::error::{Error, Result};
use crate::AppState;

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| Error::BadRequest(rejection.body_text()))
}

#[axum::debug_handler]
pub async fn start_exam(
    State(state): State<AppState>,
    payload: std::result::Result<Json<StartExamRequest>, JsonRejection>,
) -> Result<Response> {
    let req = body(payload)?;
    let started = state.exam_service.start_exam(req).await?;
    Ok(Json(started).into_response())
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SubmitAnswerRequest>, JsonRejection>,
) -> Result<Response> {
    let req = body(payload)?;
    let graded = state.exam_service.submit_answer(req).await?;
    Ok(Json(graded).into_response())
}

#[axum::debug_handler]
pub async fn request_hint(
    State(state): State<AppState>,
    payload: std::result::Result<Json<HintRequest>, JsonRejection>,
) -> Result<Response> {
    let req = body(payload)?;
    let hint = state.exam_service.request_hint(req).await?;
    Ok(Json(hint).into_response())
}

#[axum::debug_handler]
pub async fn get_exam(
    State(state): State<AppState>,
    Path(exam_id): Path<String>,
) -> Result<Response> {
    let exam = state.exam_service.get_exam(&exam_id).await?;
    Ok(Json(exam).into_response())
}

#[axum::debug_handler]
pub async fn list_exams(State(state): State<AppState>) -> Result<Response> {
    let exams = state.exam_service.list_exams().await?;
    Ok(Json(exams).into_response())
}
