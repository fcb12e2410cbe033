//! PostgreSQL-backed stores.
//!
//! Schema lives in `migrations/`. Counters and marks are stored as BIGINT and
//! checked on the way back out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, prelude::FromRow, types::Json};
use uuid::Uuid;

use crate::{
    models::{
        answer::AnswerRecord,
        attempt::AttemptResult,
        question::Question,
        quiz::{CreateQuizRequest, Quiz, QuizId, total_marks},
        session::{QuizSession, UserId},
    },
    store::{QuizCatalog, ResultStore, StoreError},
};

fn to_u32(value: i64, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, FromRow)]
struct QuizRow {
    id: i64,
    title: String,
    time_limit_seconds: i64,
    attempts_allowed: i64,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, FromRow)]
struct QuestionRow {
    id: i64,
    quiz_id: i64,
    #[sqlx(rename = "type")]
    question_type: String,
    content: String,
    options: Json<Vec<String>>,
    marks: i64,
    answer: String,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Question {
            id: row.id,
            quiz_id: row.quiz_id,
            content: row.content,
            question_type: row.question_type.parse().map_err(StoreError::Corrupt)?,
            options: row.options.0,
            marks: to_u32(row.marks, "marks")?,
            answer: row.answer,
        })
    }
}

/// Quiz catalog over the `quizzes` and `questions` tables.
#[derive(Clone)]
pub struct PgQuizCatalog {
    pool: PgPool,
}

impl PgQuizCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizCatalog for PgQuizCatalog {
    async fn get(&self, quiz_id: QuizId) -> Result<Option<Quiz>, StoreError> {
        let row = sqlx::query_as::<_, QuizRow>(
            "SELECT id, title, time_limit_seconds, attempts_allowed FROM quizzes WHERE id = $1",
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, quiz_id, type, content, options, marks, answer
            FROM questions
            WHERE quiz_id = $1
            ORDER BY position, id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Question::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Quiz {
            id: row.id,
            title: row.title,
            time_limit_seconds: to_u32(row.time_limit_seconds, "time_limit_seconds")?,
            attempts_allowed: to_u32(row.attempts_allowed, "attempts_allowed")?,
            total_marks: total_marks(&questions),
            questions,
        }))
    }

    async fn publish(&self, req: &CreateQuizRequest) -> Result<Quiz, StoreError> {
        let mut tx = self.pool.begin().await?;

        let quiz_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO quizzes (title, time_limit_seconds, attempts_allowed)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&req.title)
        .bind(i64::from(req.time_limit_seconds))
        .bind(i64::from(req.attempts_allowed))
        .fetch_one(&mut *tx)
        .await?;

        let mut questions = Vec::with_capacity(req.questions.len());
        for (position, q) in req.questions.iter().enumerate() {
            let published = q.to_question(0, quiz_id);
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO questions (quiz_id, position, type, content, options, marks, answer)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(quiz_id)
            .bind(position as i64)
            .bind(published.question_type.as_str())
            .bind(&published.content)
            .bind(Json(&published.options))
            .bind(i64::from(published.marks))
            .bind(&published.answer)
            .fetch_one(&mut *tx)
            .await?;

            questions.push(Question { id, ..published });
        }

        tx.commit().await?;

        tracing::info!(quiz_id, questions = questions.len(), "Quiz published");

        Ok(Quiz {
            id: quiz_id,
            title: req.title.clone(),
            time_limit_seconds: req.time_limit_seconds,
            attempts_allowed: req.attempts_allowed,
            total_marks: total_marks(&questions),
            questions,
        })
    }
}

/// Represents the 'attempt_results' table in the database.
#[derive(Debug, FromRow)]
struct ResultRow {
    session_id: Uuid,
    quiz_id: i64,
    user_id: i64,
    attempt_number: i64,
    score: i64,
    total_marks: i64,
    completion_reason: String,
    completed_at: DateTime<Utc>,
    answers: Json<Vec<AnswerRecord>>,
}

impl TryFrom<ResultRow> for AttemptResult {
    type Error = StoreError;

    fn try_from(row: ResultRow) -> Result<Self, Self::Error> {
        Ok(AttemptResult {
            session_id: row.session_id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            attempt_number: to_u32(row.attempt_number, "attempt_number")?,
            score: to_u32(row.score, "score")?,
            total_marks: to_u32(row.total_marks, "total_marks")?,
            answers: row.answers.0,
            completed_at: row.completed_at,
            completion_reason: row.completion_reason.parse().map_err(StoreError::Corrupt)?,
        })
    }
}

/// Result store over `attempt_results` (retained payloads) and
/// `attempt_log` (permanent attempt tally).
#[derive(Clone)]
pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn record_start(&self, session: &QuizSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO attempt_log (session_id, quiz_id, user_id, attempt_number, started_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (session_id) DO NOTHING
            "#,
        )
        .bind(session.id)
        .bind(session.quiz_id)
        .bind(session.user_id)
        .bind(i64::from(session.attempt_number))
        .bind(session.started_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put(
        &self,
        result: &AttemptResult,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Marks the attempt completed, logging it first if its start was
        // never recorded. Affects no row when it was completed already.
        let logged = sqlx::query(
            r#"
            INSERT INTO attempt_log (
                session_id, quiz_id, user_id, attempt_number, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (session_id) DO UPDATE SET completed_at = EXCLUDED.completed_at
            WHERE attempt_log.completed_at IS NULL
            "#,
        )
        .bind(result.session_id)
        .bind(result.quiz_id)
        .bind(result.user_id)
        .bind(i64::from(result.attempt_number))
        .bind(result.completed_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // A session completed by an earlier put keeps that result; a later
        // clear must not bring its payload back.
        if logged > 0 {
            sqlx::query(
                r#"
                INSERT INTO attempt_results (
                    session_id, quiz_id, user_id, attempt_number, score, total_marks,
                    completion_reason, completed_at, answers, expires_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (session_id) DO NOTHING
                "#,
            )
            .bind(result.session_id)
            .bind(result.quiz_id)
            .bind(result.user_id)
            .bind(i64::from(result.attempt_number))
            .bind(i64::from(result.score))
            .bind(i64::from(result.total_marks))
            .bind(result.completion_reason.as_str())
            .bind(result.completed_at)
            .bind(Json(&result.answers))
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<AttemptResult>, StoreError> {
        sqlx::query_as::<_, ResultRow>(
            r#"
            SELECT
                session_id, quiz_id, user_id, attempt_number, score, total_marks,
                completion_reason, completed_at, answers
            FROM attempt_results
            WHERE session_id = $1 AND (expires_at IS NULL OR expires_at > $2)
            "#,
        )
        .bind(session_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .map(AttemptResult::try_from)
        .transpose()
    }

    async fn clear(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let removed = sqlx::query("DELETE FROM attempt_results WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }

    async fn count_attempts(&self, user_id: UserId, quiz_id: QuizId) -> Result<u32, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attempt_log WHERE user_id = $1 AND quiz_id = $2",
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;
        to_u32(count, "attempt count")
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let purged = sqlx::query(
            "DELETE FROM attempt_results WHERE expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(purged)
    }
}
