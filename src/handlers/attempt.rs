// src/handlers/attempt.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::SessionManager,
    error::AppError,
    models::{
        answer::{AnswerFeedback, SubmitAnswerRequest},
        attempt::FinalizeResponse,
        quiz::QuizId,
    },
    utils::jwt::Claims,
};

/// Starts (or resumes) an attempt at a quiz for the caller.
pub async fn start_attempt(
    State(engine): State<Arc<SessionManager>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<QuizId>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let started = engine.start(quiz_id, user_id).await?;

    let status = if started.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(started)))
}

/// Session state and time left.
pub async fn get_status(
    State(engine): State<Arc<SessionManager>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let status = engine.status(session_id, claims.user_id()?).await?;
    Ok(Json(status))
}

/// The paper for a session. Answer keys are never included.
pub async fn list_questions(
    State(engine): State<Arc<SessionManager>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let questions = engine.questions(session_id, claims.user_id()?).await?;
    Ok(Json(questions))
}

/// Records one answer and returns its marking straight away.
///
/// A question can be answered once; a second submission is rejected with
/// `409 AlreadyAnswered` and the original marking in the body.
pub async fn submit_answer(
    State(engine): State<Arc<SessionManager>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let record = engine
        .submit_answer(
            session_id,
            claims.user_id()?,
            payload.question_id,
            &payload.response,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(AnswerFeedback::from(&record))))
}

/// Manual submit. Repeating it returns the same score.
pub async fn finalize_attempt(
    State(engine): State<Arc<SessionManager>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = engine
        .finalize_attempt(session_id, claims.user_id()?)
        .await?;
    Ok(Json(FinalizeResponse::from(&result)))
}

pub async fn get_result(
    State(engine): State<Arc<SessionManager>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let result = engine.result(session_id, claims.user_id()?).await?;
    Ok(Json(result))
}

pub async fn clear_result(
    State(engine): State<Arc<SessionManager>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    engine.clear_result(session_id, claims.user_id()?).await?;
    Ok(StatusCode::NO_CONTENT)
}
