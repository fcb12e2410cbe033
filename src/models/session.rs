// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{answer::AnswerFeedback, question::PublicQuestion, quiz::QuizId};

pub type UserId = i64;

/// Lifecycle of a quiz session. Transitions only move forward:
/// `Created -> InProgress -> Finalizing -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionState {
    Created,
    InProgress,
    Finalizing,
    Completed,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    pub id: Uuid,
    pub quiz_id: QuizId,
    pub user_id: UserId,
    pub attempt_number: u32,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,

    /// `started_at + time_limit_seconds`, fixed at start.
    pub deadline: DateTime<Utc>,
}

/// Response for `GET /api/attempts/{session_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    #[serde(flatten)]
    pub session: QuizSession,
    pub remaining_seconds: u64,
    pub answered: usize,
    pub total_questions: usize,
}

/// A question as seen from inside a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuestion {
    #[serde(flatten)]
    pub question: PublicQuestion,

    /// Feedback for this question once it has been answered.
    pub feedback: Option<AnswerFeedback>,
}

/// Response for `GET /api/attempts/{session_id}/questions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuestionsResponse {
    pub session_id: Uuid,
    pub title: String,
    pub remaining_seconds: u64,
    pub questions: Vec<SessionQuestion>,
}
