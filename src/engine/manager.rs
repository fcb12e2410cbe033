//! Quiz session lifecycle: start, answer, finalize, read back.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use chrono::TimeDelta;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::EngineConfig,
    engine::{
        clock::Clock,
        error::EngineError,
        scoring,
        session::SessionHandle,
        watcher::{self, RetryPolicy},
    },
    models::{
        answer::{AnswerFeedback, AnswerRecord},
        attempt::{AttemptResult, CompletionReason, StartAttemptResponse},
        question::QuestionId,
        quiz::QuizId,
        session::{
            QuizSession, SessionQuestion, SessionQuestionsResponse, SessionState,
            SessionStatusResponse, UserId,
        },
    },
    store::{QuizCatalog, ResultStore},
};

/// What a sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Completed sessions dropped from the registry.
    pub archived: usize,
    /// Overdue sessions finalized because their watcher had given up.
    pub finalized: usize,
    /// Stored results dropped after their retention.
    pub purged_results: u64,
}

/// Owns every live quiz session.
///
/// `finalize` is the only path to `Completed`. Starts are serialized per
/// (user, quiz) so the attempt count cannot be read twice by racing starts.
pub struct SessionManager {
    catalog: Arc<dyn QuizCatalog>,
    results: Arc<dyn ResultStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
    start_locks: Mutex<HashMap<(UserId, QuizId), Arc<Mutex<()>>>>,
    this: Weak<SessionManager>,
}

impl SessionManager {
    pub fn new(
        catalog: Arc<dyn QuizCatalog>,
        results: Arc<dyn ResultStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            catalog,
            results,
            clock,
            config,
            sessions: RwLock::new(HashMap::new()),
            start_locks: Mutex::new(HashMap::new()),
            this: this.clone(),
        })
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Starts an attempt at `quiz_id` for `user_id`.
    ///
    /// If the user already has an unfinished session for this quiz, that
    /// session is handed back with `resumed` set instead of using up
    /// another attempt.
    pub async fn start(
        &self,
        quiz_id: QuizId,
        user_id: UserId,
    ) -> Result<StartAttemptResponse, EngineError> {
        let pair_lock = self.pair_lock(user_id, quiz_id).await;
        let _guard = pair_lock.lock().await;

        if let Some(handle) = self.live_session(user_id, quiz_id).await {
            debug!(session_id = %handle.id, quiz_id, user_id, "Resuming unfinished attempt");
            return Ok(self.start_response(&handle, true));
        }

        let quiz = self
            .catalog
            .get(quiz_id)
            .await?
            .ok_or(EngineError::QuizNotFound(quiz_id))?;

        let prior = self.results.count_attempts(user_id, quiz_id).await?;
        if prior >= quiz.attempts_allowed {
            warn!(quiz_id, user_id, prior, allowed = quiz.attempts_allowed, "Attempt limit reached");
            return Err(EngineError::AttemptLimitExceeded {
                quiz_id,
                allowed: quiz.attempts_allowed,
            });
        }

        let handle = Arc::new(SessionHandle::new(
            Uuid::new_v4(),
            Arc::new(quiz),
            user_id,
            prior + 1,
            self.clock.now(),
        ));
        // Logged before the session is handed out, so an attempt lost with
        // this process still counts.
        self.results.record_start(&handle.snapshot().await).await?;
        handle.activate().await;
        self.sessions
            .write()
            .await
            .insert(handle.id, handle.clone());

        let task = watcher::spawn(
            self.this.clone(),
            handle.id,
            handle.deadline,
            self.clock.clone(),
            handle.watch.clone(),
            self.retry_policy(),
        );
        handle.attach_watcher(task);

        info!(
            session_id = %handle.id,
            quiz_id,
            user_id,
            attempt = handle.attempt_number,
            deadline = %handle.deadline,
            "Attempt started"
        );

        Ok(self.start_response(&handle, false))
    }

    /// Records an answer. See [`SessionHandle::submit_answer`].
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        user_id: UserId,
        question_id: QuestionId,
        response: &str,
    ) -> Result<AnswerRecord, EngineError> {
        let Some(handle) = self.owned_session(session_id, user_id).await else {
            // An archived session can only be a completed one.
            return match self.owned_result(session_id, user_id).await? {
                Some(_) => Err(EngineError::AlreadyCompleted(session_id)),
                None => Err(EngineError::SessionNotFound(session_id)),
            };
        };

        let outcome = handle
            .submit_answer(question_id, response, self.clock.as_ref())
            .await;
        match &outcome {
            Ok(record) => debug!(
                %session_id,
                question_id,
                correct = record.is_correct,
                marks = record.marks_awarded,
                "Answer recorded"
            ),
            Err(e) => debug!(%session_id, question_id, code = e.code(), "Answer rejected"),
        }
        outcome
    }

    /// Manual submit by the session's owner.
    pub async fn finalize_attempt(
        &self,
        session_id: Uuid,
        user_id: UserId,
    ) -> Result<AttemptResult, EngineError> {
        match self.session_handle(session_id).await {
            Some(handle) if handle.user_id == user_id => {
                self.finalize_handle(&handle, CompletionReason::Manual).await
            }
            Some(_) => Err(EngineError::SessionNotFound(session_id)),
            None => self
                .owned_result(session_id, user_id)
                .await?
                .ok_or(EngineError::SessionNotFound(session_id)),
        }
    }

    /// Finalizes a session. Safe to call any number of times from any task;
    /// every call returns the same result.
    pub async fn finalize(
        &self,
        session_id: Uuid,
        reason: CompletionReason,
    ) -> Result<AttemptResult, EngineError> {
        match self.session_handle(session_id).await {
            Some(handle) => self.finalize_handle(&handle, reason).await,
            None => self
                .results
                .get(session_id, self.clock.now())
                .await?
                .map(rederive)
                .ok_or(EngineError::SessionNotFound(session_id)),
        }
    }

    pub async fn status(
        &self,
        session_id: Uuid,
        user_id: UserId,
    ) -> Result<SessionStatusResponse, EngineError> {
        let handle = self
            .owned_session(session_id, user_id)
            .await
            .ok_or(EngineError::SessionNotFound(session_id))?;

        let session = handle.snapshot().await;
        let remaining_seconds = self.remaining_seconds(&handle, session.state);
        Ok(SessionStatusResponse {
            session,
            remaining_seconds,
            answered: handle.ledger().answered(),
            total_questions: handle.quiz.questions.len(),
        })
    }

    /// The session's questions without answer keys, with feedback for the
    /// ones already answered.
    pub async fn questions(
        &self,
        session_id: Uuid,
        user_id: UserId,
    ) -> Result<SessionQuestionsResponse, EngineError> {
        let handle = self
            .owned_session(session_id, user_id)
            .await
            .ok_or(EngineError::SessionNotFound(session_id))?;

        let questions = handle
            .quiz
            .questions
            .iter()
            .map(|q| SessionQuestion {
                question: q.into(),
                feedback: handle.ledger().get(q.id).map(AnswerFeedback::from),
            })
            .collect();

        Ok(SessionQuestionsResponse {
            session_id,
            title: handle.quiz.title.clone(),
            remaining_seconds: self.remaining_seconds(&handle, handle.state().await),
            questions,
        })
    }

    /// A stored result, with its score re-derived from its answers.
    pub async fn result(
        &self,
        session_id: Uuid,
        user_id: UserId,
    ) -> Result<AttemptResult, EngineError> {
        self.owned_result(session_id, user_id)
            .await?
            .ok_or(EngineError::ResultNotFound(session_id))
    }

    /// Drops a stored result once the consumer is done with it. The attempt
    /// still counts towards the limit.
    pub async fn clear_result(&self, session_id: Uuid, user_id: UserId) -> Result<(), EngineError> {
        self.result(session_id, user_id).await?;
        self.results.clear(session_id).await?;
        info!(%session_id, user_id, "Result cleared");
        Ok(())
    }

    /// Snapshot of a session still in the registry.
    pub async fn session(&self, session_id: Uuid) -> Option<QuizSession> {
        match self.session_handle(session_id).await {
            Some(handle) => Some(handle.snapshot().await),
            None => None,
        }
    }

    /// Number of sessions in the registry, completed ones included.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Housekeeping: finalizes overdue sessions whose watcher gave up,
    /// archives completed sessions past retention, purges expired results.
    pub async fn sweep(&self) -> Result<SweepReport, EngineError> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.read().await.values().cloned().collect();
        for handle in &handles {
            if handle.completed_at().is_some()
                || handle.deadline > now
                || !handle.watcher_finished()
            {
                continue;
            }
            match self.finalize_handle(handle, CompletionReason::Timeout).await {
                Ok(_) => report.finalized += 1,
                Err(e) => warn!(session_id = %handle.id, error = %e, "Overdue session still not finalized"),
            }
        }

        let retention = TimeDelta::from_std(self.config.session_retention).unwrap_or(TimeDelta::MAX);
        {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, handle| {
                handle
                    .completed_at()
                    .is_none_or(|completed| now - completed < retention)
            });
            report.archived = before - sessions.len();
        }

        report.purged_results = self.results.purge_expired(now).await?;

        self.start_locks
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);

        if report != SweepReport::default() {
            info!(
                archived = report.archived,
                finalized = report.finalized,
                purged = report.purged_results,
                "Sweep finished"
            );
        }
        Ok(report)
    }

    async fn finalize_handle(
        &self,
        handle: &SessionHandle,
        reason: CompletionReason,
    ) -> Result<AttemptResult, EngineError> {
        let retention = self
            .config
            .result_retention
            .and_then(|ttl| TimeDelta::from_std(ttl).ok());
        handle
            .finalize(reason, self.results.as_ref(), self.clock.as_ref(), retention)
            .await
    }

    async fn session_handle(&self, session_id: Uuid) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    /// Sessions belong to their user; anyone else is told it does not exist.
    async fn owned_session(&self, session_id: Uuid, user_id: UserId) -> Option<Arc<SessionHandle>> {
        self.session_handle(session_id)
            .await
            .filter(|handle| handle.user_id == user_id)
    }

    async fn owned_result(
        &self,
        session_id: Uuid,
        user_id: UserId,
    ) -> Result<Option<AttemptResult>, EngineError> {
        Ok(self
            .results
            .get(session_id, self.clock.now())
            .await?
            .filter(|result| result.user_id == user_id)
            .map(rederive))
    }

    async fn live_session(&self, user_id: UserId, quiz_id: QuizId) -> Option<Arc<SessionHandle>> {
        let candidates: Vec<Arc<SessionHandle>> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|h| h.user_id == user_id && h.quiz.id == quiz_id)
            .cloned()
            .collect();

        for handle in candidates {
            if handle.state().await != SessionState::Completed {
                return Some(handle);
            }
        }
        None
    }

    async fn pair_lock(&self, user_id: UserId, quiz_id: QuizId) -> Arc<Mutex<()>> {
        self.start_locks
            .lock()
            .await
            .entry((user_id, quiz_id))
            .or_default()
            .clone()
    }

    fn start_response(&self, handle: &SessionHandle, resumed: bool) -> StartAttemptResponse {
        StartAttemptResponse {
            session_id: handle.id,
            quiz_id: handle.quiz.id,
            time_limit_seconds: handle.quiz.time_limit_seconds,
            total_marks: handle.quiz.total_marks,
            attempts_allowed: handle.quiz.attempts_allowed,
            attempt_number: handle.attempt_number,
            remaining_attempts: handle.quiz.attempts_allowed.saturating_sub(handle.attempt_number),
            remaining_seconds: self.clock.remaining_seconds(handle.deadline),
            deadline: handle.deadline,
            resumed,
        }
    }

    /// Time left to answer; none once the session stops taking answers.
    fn remaining_seconds(&self, handle: &SessionHandle, state: SessionState) -> u64 {
        match state {
            SessionState::InProgress => self.clock.remaining_seconds(handle.deadline),
            _ => 0,
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff: self.config.timeout_retry_backoff,
            max_retries: self.config.timeout_max_retries,
        }
    }
}

/// Recomputes a stored score from its answers.
fn rederive(mut result: AttemptResult) -> AttemptResult {
    let derived = scoring::aggregate(&result.answers);
    if derived != result.score {
        warn!(
            session_id = %result.session_id,
            stored = result.score,
            derived,
            "Stored score disagrees with its answers"
        );
        result.score = derived;
    }
    result
}
