//! Engine error types

use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{answer::AnswerRecord, quiz::QuizId},
    store::StoreError,
};

/// Broad category of an [`EngineError`], which decides how a caller reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; the caller can correct it.
    Validation,
    /// Invalid for the session's current state; never corrupts state.
    State,
    /// No attempts left for this (user, quiz). Terminal.
    AttemptLimitExceeded,
    /// Unknown session, result or quiz.
    NotFound,
    /// Storage failure; retry with backoff.
    Transient,
    /// Storage returned data that cannot be used. Retrying will not help.
    Internal,
}

/// Errors for quiz attempt operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Carries the original record, which stays authoritative.
    #[error("Question {} already answered", .0.question_id)]
    AlreadyAnswered(Box<AnswerRecord>),

    #[error("Session {0} has already completed")]
    AlreadyCompleted(Uuid),

    #[error("Session {0} is being finalized")]
    Finalizing(Uuid),

    #[error("Session {0} has not started")]
    NotStarted(Uuid),

    #[error("Session {0} has passed its deadline")]
    SessionExpired(Uuid),

    #[error("Attempt limit exceeded for quiz {quiz_id}: {allowed} attempt(s) allowed")]
    AttemptLimitExceeded { quiz_id: QuizId, allowed: u32 },

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Result not found: {0}")]
    ResultNotFound(Uuid),

    #[error("Quiz not found: {0}")]
    QuizNotFound(QuizId),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::AlreadyAnswered(_)
            | EngineError::AlreadyCompleted(_)
            | EngineError::Finalizing(_)
            | EngineError::NotStarted(_)
            | EngineError::SessionExpired(_) => ErrorKind::State,
            EngineError::AttemptLimitExceeded { .. } => ErrorKind::AttemptLimitExceeded,
            EngineError::SessionNotFound(_)
            | EngineError::ResultNotFound(_)
            | EngineError::QuizNotFound(_) => ErrorKind::NotFound,
            EngineError::Storage(e) if e.is_transient() => ErrorKind::Transient,
            EngineError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Machine-readable code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "ValidationError",
            EngineError::AlreadyAnswered(_) => "AlreadyAnswered",
            EngineError::AlreadyCompleted(_) => "AlreadyCompleted",
            EngineError::Finalizing(_) => "Finalizing",
            EngineError::NotStarted(_) => "NotStarted",
            EngineError::SessionExpired(_) => "SessionExpired",
            EngineError::AttemptLimitExceeded { .. } => "AttemptLimitExceeded",
            EngineError::SessionNotFound(_) => "SessionNotFound",
            EngineError::ResultNotFound(_) => "ResultNotFound",
            EngineError::QuizNotFound(_) => "QuizNotFound",
            EngineError::Storage(e) if e.is_transient() => "TransientError",
            EngineError::Storage(_) => "InternalError",
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
