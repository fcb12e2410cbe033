// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::{CreateQuestionRequest, Question, QuestionId};

pub type QuizId = i64;

/// A published quiz. Immutable once published; sessions hold a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    pub time_limit_seconds: u32,
    pub attempts_allowed: u32,

    /// Sum of the marks of every question.
    pub total_marks: u32,

    /// Questions in presentation order.
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn time_limit(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.time_limit_seconds))
    }
}

/// Total marks for a list of questions.
pub fn total_marks(questions: &[Question]) -> u32 {
    questions.iter().map(|q| q.marks).sum()
}

/// DTO for publishing a new quiz.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 1, max = 86400))]
    pub time_limit_seconds: u32,
    #[validate(range(min = 1, max = 100))]
    pub attempts_allowed: u32,
    #[validate(length(min = 1, max = 200), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}
