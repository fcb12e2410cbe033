// src/models/attempt.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{answer::AnswerRecord, quiz::QuizId, session::UserId};

/// What ended an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionReason {
    Manual,
    Timeout,
}

impl CompletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionReason::Manual => "Manual",
            CompletionReason::Timeout => "Timeout",
        }
    }
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Manual" => Ok(CompletionReason::Manual),
            "Timeout" => Ok(CompletionReason::Timeout),
            other => Err(format!("unknown completion reason '{other}'")),
        }
    }
}

/// The durable outcome of a finished attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub session_id: Uuid,
    pub quiz_id: QuizId,
    pub user_id: UserId,
    pub attempt_number: u32,

    /// Sum of `marks_awarded` over `answers`.
    pub score: u32,
    pub total_marks: u32,

    /// Snapshot of the ledger, in quiz question order.
    pub answers: Vec<AnswerRecord>,
    pub completed_at: DateTime<Utc>,
    pub completion_reason: CompletionReason,
}

/// Response for a started (or resumed) attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptResponse {
    pub session_id: Uuid,
    pub quiz_id: QuizId,
    pub time_limit_seconds: u32,
    pub total_marks: u32,
    pub attempts_allowed: u32,
    pub attempt_number: u32,
    pub remaining_attempts: u32,
    pub remaining_seconds: u64,
    pub deadline: DateTime<Utc>,

    /// True when an attempt already in progress was handed back.
    pub resumed: bool,
}

/// Response for a finalized attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    pub session_id: Uuid,
    pub score: u32,
    pub total_marks: u32,
    pub attempt_number: u32,
    pub completion_reason: CompletionReason,
}

impl From<&AttemptResult> for FinalizeResponse {
    fn from(result: &AttemptResult) -> Self {
        Self {
            session_id: result.session_id,
            score: result.score,
            total_marks: result.total_marks,
            attempt_number: result.attempt_number,
            completion_reason: result.completion_reason,
        }
    }
}
