// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError, models::quiz::CreateQuizRequest, store::QuizCatalog, utils::jwt::Claims,
};

/// Publishes a quiz with its questions.
/// Admin only.
pub async fn publish_quiz(
    State(catalog): State<Arc<dyn QuizCatalog>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = catalog.publish(&payload).await?;

    tracing::info!(
        quiz_id = quiz.id,
        questions = quiz.questions.len(),
        total_marks = quiz.total_marks,
        admin = %claims.sub,
        "Quiz published"
    );

    Ok((StatusCode::CREATED, Json(quiz)))
}
