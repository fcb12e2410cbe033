//! Live state of one quiz session.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    engine::{clock::Clock, error::EngineError, ledger::AnswerLedger},
    models::{
        answer::AnswerRecord,
        attempt::{AttemptResult, CompletionReason},
        question::QuestionId,
        quiz::Quiz,
        session::{QuizSession, SessionState, UserId},
    },
    store::ResultStore,
};

/// Scored outcome held by whichever caller is finalizing.
#[derive(Default)]
struct Finalization {
    result: Option<AttemptResult>,
    persisted: bool,
}

/// A session in the registry.
///
/// `state` is the only thing that gates writes: answers are appended under a
/// read guard, and the move to `Finalizing` takes the write guard, so once a
/// session is `Finalizing` its ledger can no longer change.
pub(crate) struct SessionHandle {
    pub(crate) id: Uuid,
    pub(crate) quiz: Arc<Quiz>,
    pub(crate) user_id: UserId,
    pub(crate) attempt_number: u32,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) deadline: DateTime<Utc>,
    state: RwLock<SessionState>,
    ledger: AnswerLedger,
    reason: OnceLock<CompletionReason>,
    finalization: Mutex<Finalization>,
    completed_at: OnceLock<DateTime<Utc>>,
    /// Cancels the deadline watcher.
    pub(crate) watch: CancellationToken,
    watcher: OnceLock<JoinHandle<()>>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: Uuid,
        quiz: Arc<Quiz>,
        user_id: UserId,
        attempt_number: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        let deadline = started_at + quiz.time_limit();
        let ledger = AnswerLedger::new(id, &quiz);
        Self {
            id,
            quiz,
            user_id,
            attempt_number,
            started_at,
            deadline,
            state: RwLock::new(SessionState::Created),
            ledger,
            reason: OnceLock::new(),
            finalization: Mutex::new(Finalization::default()),
            completed_at: OnceLock::new(),
            watch: CancellationToken::new(),
            watcher: OnceLock::new(),
        }
    }

    pub(crate) fn attach_watcher(&self, task: JoinHandle<()>) {
        let _ = self.watcher.set(task);
    }

    /// True once the deadline watcher has exited, for whatever reason.
    pub(crate) fn watcher_finished(&self) -> bool {
        self.watcher.get().is_none_or(JoinHandle::is_finished)
    }

    pub(crate) async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub(crate) async fn snapshot(&self) -> QuizSession {
        QuizSession {
            id: self.id,
            quiz_id: self.quiz.id,
            user_id: self.user_id,
            attempt_number: self.attempt_number,
            state: self.state().await,
            started_at: self.started_at,
            deadline: self.deadline,
        }
    }

    pub(crate) fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    /// When the session reached `Completed`, if it has.
    pub(crate) fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.get().copied()
    }

    /// `Created -> InProgress`.
    pub(crate) async fn activate(&self) {
        let mut state = self.state.write().await;
        if *state == SessionState::Created {
            *state = SessionState::InProgress;
        }
    }

    pub(crate) async fn submit_answer(
        &self,
        question_id: QuestionId,
        response: &str,
        clock: &dyn Clock,
    ) -> Result<AnswerRecord, EngineError> {
        let state = self.state.read().await;
        match *state {
            SessionState::InProgress => {}
            SessionState::Created => return Err(EngineError::NotStarted(self.id)),
            SessionState::Finalizing => return Err(EngineError::Finalizing(self.id)),
            SessionState::Completed => return Err(EngineError::AlreadyCompleted(self.id)),
        }

        if clock.remaining(self.deadline).is_zero() {
            return Err(EngineError::SessionExpired(self.id));
        }

        let question = self.quiz.question(question_id).ok_or_else(|| {
            EngineError::Validation(format!(
                "question {question_id} is not part of quiz {}",
                self.quiz.id
            ))
        })?;

        self.ledger.record(question, response, clock.now())
    }

    /// Moves the session to `Completed`, scoring and persisting it exactly once.
    ///
    /// The first caller to flip `InProgress -> Finalizing` fixes the
    /// completion reason, which is always `Timeout` once the deadline has
    /// passed. Every caller then queues on `finalization`; the
    /// first one through scores the ledger and stores the result, the rest
    /// return that same result. If storing fails the session stays
    /// `Finalizing` with the scored result kept, and the next caller stores
    /// it instead of scoring again.
    pub(crate) async fn finalize(
        &self,
        reason: CompletionReason,
        results: &dyn ResultStore,
        clock: &dyn Clock,
        retention: Option<chrono::Duration>,
    ) -> Result<AttemptResult, EngineError> {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Created => return Err(EngineError::NotStarted(self.id)),
                SessionState::InProgress => {
                    *state = SessionState::Finalizing;
                    // Past the deadline the attempt timed out, whoever got here first.
                    let reason = if clock.remaining(self.deadline).is_zero() {
                        CompletionReason::Timeout
                    } else {
                        reason
                    };
                    let _ = self.reason.set(reason);
                    tracing::debug!(session_id = %self.id, %reason, "Session finalizing");
                }
                SessionState::Finalizing | SessionState::Completed => {}
            }
        }

        let mut finalization = self.finalization.lock().await;

        let result = match &finalization.result {
            Some(result) => result.clone(),
            None => {
                let result = self.build_result(reason, clock.now());
                finalization.result = Some(result.clone());
                result
            }
        };

        if !finalization.persisted {
            let expires_at = retention.and_then(|ttl| result.completed_at.checked_add_signed(ttl));
            if let Err(e) = results.put(&result, expires_at).await {
                tracing::warn!(session_id = %self.id, error = %e, "Failed to store attempt result");
                return Err(e.into());
            }
            finalization.persisted = true;

            *self.state.write().await = SessionState::Completed;
            let _ = self.completed_at.set(clock.now());
            self.watch.cancel();

            tracing::info!(
                session_id = %self.id,
                quiz_id = result.quiz_id,
                user_id = result.user_id,
                attempt = result.attempt_number,
                score = result.score,
                total = result.total_marks,
                reason = %result.completion_reason,
                "Attempt completed"
            );
        }

        Ok(result)
    }

    fn build_result(&self, fallback: CompletionReason, now: DateTime<Utc>) -> AttemptResult {
        let answers = self.ledger.snapshot();
        AttemptResult {
            session_id: self.id,
            quiz_id: self.quiz.id,
            user_id: self.user_id,
            attempt_number: self.attempt_number,
            score: crate::engine::scoring::aggregate(&answers),
            total_marks: self.quiz.total_marks,
            answers,
            completed_at: now,
            completion_reason: self.reason.get().copied().unwrap_or(fallback),
        }
    }
}
