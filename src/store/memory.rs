//! In-memory stores, used by tests and single-node development.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{
        attempt::AttemptResult,
        quiz::{CreateQuizRequest, Quiz, QuizId, total_marks},
        session::{QuizSession, UserId},
    },
    store::{QuizCatalog, ResultStore, StoreError},
};

#[derive(Default)]
struct CatalogInner {
    quizzes: HashMap<QuizId, Quiz>,
    next_quiz_id: QuizId,
    next_question_id: i64,
}

/// Quiz catalog held in process memory.
#[derive(Default)]
pub struct MemoryQuizCatalog {
    inner: RwLock<CatalogInner>,
}

impl MemoryQuizCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizCatalog for MemoryQuizCatalog {
    async fn get(&self, quiz_id: QuizId) -> Result<Option<Quiz>, StoreError> {
        Ok(self.inner.read().await.quizzes.get(&quiz_id).cloned())
    }

    async fn publish(&self, req: &CreateQuizRequest) -> Result<Quiz, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_quiz_id += 1;
        let quiz_id = inner.next_quiz_id;

        let mut questions = Vec::with_capacity(req.questions.len());
        for q in &req.questions {
            inner.next_question_id += 1;
            questions.push(q.to_question(inner.next_question_id, quiz_id));
        }

        let quiz = Quiz {
            id: quiz_id,
            title: req.title.clone(),
            time_limit_seconds: req.time_limit_seconds,
            attempts_allowed: req.attempts_allowed,
            total_marks: total_marks(&questions),
            questions,
        };
        inner.quizzes.insert(quiz_id, quiz.clone());
        Ok(quiz)
    }
}

struct StoredResult {
    result: AttemptResult,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct ResultsInner {
    results: HashMap<Uuid, StoredResult>,
    /// Session ids of every started attempt, per (user, quiz).
    attempts: HashMap<(UserId, QuizId), HashSet<Uuid>>,
    completed: HashSet<Uuid>,
}

/// Result store held in process memory.
#[derive(Default)]
pub struct MemoryResultStore {
    inner: RwLock<ResultsInner>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn record_start(&self, session: &QuizSession) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .attempts
            .entry((session.user_id, session.quiz_id))
            .or_default()
            .insert(session.id);
        Ok(())
    }

    async fn put(
        &self,
        result: &AttemptResult,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .attempts
            .entry((result.user_id, result.quiz_id))
            .or_default()
            .insert(result.session_id);

        if inner.completed.insert(result.session_id) {
            inner.results.insert(
                result.session_id,
                StoredResult {
                    result: result.clone(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn get(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<AttemptResult>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .results
            .get(&session_id)
            .filter(|stored| stored.expires_at.is_none_or(|at| at > now))
            .map(|stored| stored.result.clone()))
    }

    async fn clear(&self, session_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.inner.write().await.results.remove(&session_id).is_some())
    }

    async fn count_attempts(&self, user_id: UserId, quiz_id: QuizId) -> Result<u32, StoreError> {
        let inner = self.inner.read().await;
        let count = inner
            .attempts
            .get(&(user_id, quiz_id))
            .map_or(0, HashSet::len);
        u32::try_from(count).map_err(|_| StoreError::Corrupt("attempt count overflow".into()))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.results.len();
        inner
            .results
            .retain(|_, stored| stored.expires_at.is_none_or(|at| at > now));
        Ok((before - inner.results.len()) as u64)
    }
}
