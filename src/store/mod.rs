//! Storage seams for quizzes and completed attempts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    attempt::AttemptResult,
    quiz::{CreateQuizRequest, Quiz, QuizId},
    session::{QuizSession, UserId},
};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryQuizCatalog, MemoryResultStore};
pub use postgres::{PgQuizCatalog, PgResultStore};

/// Errors raised by storage backends.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the same operation can succeed. Bad data read back
    /// from storage stays bad however often it is read.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(e) => !matches!(
                e,
                sqlx::Error::RowNotFound
                    | sqlx::Error::TypeNotFound { .. }
                    | sqlx::Error::ColumnNotFound(_)
                    | sqlx::Error::ColumnIndexOutOfBounds { .. }
                    | sqlx::Error::ColumnDecode { .. }
                    | sqlx::Error::Decode(_)
            ),
            StoreError::Unavailable(_) => true,
            StoreError::Serialization(_) | StoreError::Corrupt(_) => false,
        }
    }
}

/// Read access to published quizzes, plus publishing.
#[async_trait]
pub trait QuizCatalog: Send + Sync {
    /// Fetch a published quiz with its questions in order.
    async fn get(&self, quiz_id: QuizId) -> Result<Option<Quiz>, StoreError>;

    /// Publish a quiz. Ids are assigned by the catalog. The request is
    /// expected to have passed validation already.
    async fn publish(&self, quiz: &CreateQuizRequest) -> Result<Quiz, StoreError>;
}

/// Durable store of attempts and their results, keyed by session id.
///
/// Every attempt is logged when it starts, so one lost with a crashed
/// process still counts. Results are retained until cleared or until
/// `expires_at` passes. The attempt log behind
/// [`ResultStore::count_attempts`] is never reduced by `clear` or expiry.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Log a newly started attempt. Logging the same session twice is a no-op.
    async fn record_start(&self, session: &QuizSession) -> Result<(), StoreError>;

    /// Store a result and mark its attempt completed. Only the first put
    /// for a session stores anything.
    async fn put(
        &self,
        result: &AttemptResult,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Fetch a result that has not expired as of `now`.
    async fn get(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<AttemptResult>, StoreError>;

    /// Remove a result. Returns whether anything was removed.
    async fn clear(&self, session_id: Uuid) -> Result<bool, StoreError>;

    /// Number of attempts ever started by `user_id` on `quiz_id`, finished
    /// or not.
    async fn count_attempts(&self, user_id: UserId, quiz_id: QuizId) -> Result<u32, StoreError>;

    /// Drop results whose retention has passed. Returns how many were dropped.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}
