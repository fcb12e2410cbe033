// src/models/answer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::QuestionId;

/// One scored answer. At most one exists per (session, question).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub session_id: Uuid,
    pub question_id: QuestionId,
    pub response: String,
    pub is_correct: bool,

    /// Never more than the question's marks.
    pub marks_awarded: u32,
    pub submitted_at: DateTime<Utc>,
}

/// Per-question feedback returned to the attempt taker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub question_id: QuestionId,
    pub is_correct: bool,
    pub marks_awarded: u32,
}

impl From<&AnswerRecord> for AnswerFeedback {
    fn from(record: &AnswerRecord) -> Self {
        Self {
            question_id: record.question_id,
            is_correct: record.is_correct,
            marks_awarded: record.marks_awarded,
        }
    }
}

/// DTO for submitting one answer.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub question_id: QuestionId,
    #[validate(length(min = 1, max = 2000))]
    pub response: String,
}
