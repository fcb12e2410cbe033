//! Lifecycle tests for the session engine.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use super::*;
use crate::{
    config::EngineConfig,
    models::{
        attempt::{AttemptResult, CompletionReason},
        question::{CreateQuestionRequest, QuestionType},
        quiz::{CreateQuizRequest, Quiz, QuizId},
        session::{QuizSession, SessionState, UserId},
    },
    store::{MemoryQuizCatalog, MemoryResultStore, QuizCatalog, ResultStore, StoreError},
};

const USER: UserId = 7;

/// 60 seconds, Q1 MCQ (answer "A") and Q2 SHORT_ANSWER ("Paris"), 5 marks each.
fn two_question_quiz(attempts_allowed: u32) -> CreateQuizRequest {
    CreateQuizRequest {
        title: "Scenario".to_string(),
        time_limit_seconds: 60,
        attempts_allowed,
        questions: vec![
            CreateQuestionRequest {
                content: "Pick A".to_string(),
                question_type: QuestionType::Mcq,
                options: vec!["A".to_string(), "B".to_string()],
                marks: 5,
                answer: "A".to_string(),
            },
            CreateQuestionRequest {
                content: "Capital of France?".to_string(),
                question_type: QuestionType::ShortAnswer,
                options: Vec::new(),
                marks: 5,
                answer: "Paris".to_string(),
            },
        ],
    }
}

/// Result store that fails the first `failures` puts and records every
/// result it was asked to store.
#[derive(Default)]
struct FlakyResultStore {
    inner: MemoryResultStore,
    failures: AtomicU32,
    attempted: Mutex<Vec<AttemptResult>>,
}

impl FlakyResultStore {
    fn failing(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            ..Default::default()
        }
    }

    fn attempted(&self) -> Vec<AttemptResult> {
        self.attempted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultStore for FlakyResultStore {
    async fn record_start(&self, session: &QuizSession) -> Result<(), StoreError> {
        self.inner.record_start(session).await
    }

    async fn put(
        &self,
        result: &AttemptResult,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.attempted.lock().unwrap().push(result.clone());
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        self.inner.put(result, expires_at).await
    }

    async fn get(
        &self,
        session_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<AttemptResult>, StoreError> {
        self.inner.get(session_id, now).await
    }

    async fn clear(&self, session_id: Uuid) -> Result<bool, StoreError> {
        self.inner.clear(session_id).await
    }

    async fn count_attempts(&self, user_id: UserId, quiz_id: QuizId) -> Result<u32, StoreError> {
        self.inner.count_attempts(user_id, quiz_id).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.inner.purge_expired(now).await
    }
}

/// Clock moved by hand, independent of tokio time.
struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

struct Harness<S: ResultStore + 'static> {
    manager: Arc<SessionManager>,
    results: Arc<S>,
    quiz: Quiz,
}

async fn harness_with<S: ResultStore + 'static>(
    results: S,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    attempts_allowed: u32,
) -> Harness<S> {
    let catalog = Arc::new(MemoryQuizCatalog::new());
    let quiz = catalog
        .publish(&two_question_quiz(attempts_allowed))
        .await
        .unwrap();
    let results = Arc::new(results);
    let manager = SessionManager::new(catalog, results.clone(), clock, config);
    Harness {
        manager,
        results,
        quiz,
    }
}

async fn harness(attempts_allowed: u32) -> Harness<MemoryResultStore> {
    harness_with(
        MemoryResultStore::new(),
        Arc::new(MonotonicClock::new()),
        EngineConfig::default(),
        attempts_allowed,
    )
    .await
}

#[tokio::test(start_paused = true)]
async fn test_timeout_finalizes_recorded_answers() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    assert_eq!(started.attempt_number, 1);
    assert_eq!(started.total_marks, 10);
    assert_eq!(started.remaining_seconds, 60);
    assert_eq!(started.remaining_attempts, 0);

    let q1 = &h.quiz.questions[0];
    let record = h
        .manager
        .submit_answer(started.session_id, USER, q1.id, "A")
        .await
        .unwrap();
    assert!(record.is_correct);
    assert_eq!(record.marks_awarded, 5);

    tokio::time::sleep(Duration::from_secs(61)).await;

    let status = h.manager.status(started.session_id, USER).await.unwrap();
    assert_eq!(status.session.state, SessionState::Completed);
    assert_eq!(status.remaining_seconds, 0);

    let result = h.manager.result(started.session_id, USER).await.unwrap();
    assert_eq!(result.score, 5);
    assert_eq!(result.total_marks, 10);
    assert_eq!(result.completion_reason, CompletionReason::Timeout);
    assert_eq!(result.answers, vec![record]);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_submit_keeps_first_answer() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    let q1 = &h.quiz.questions[0];

    let first = h
        .manager
        .submit_answer(started.session_id, USER, q1.id, "B")
        .await
        .unwrap();
    assert!(!first.is_correct);

    match h
        .manager
        .submit_answer(started.session_id, USER, q1.id, "A")
        .await
    {
        Err(EngineError::AlreadyAnswered(existing)) => assert_eq!(*existing, first),
        other => panic!("expected AlreadyAnswered, got {other:?}"),
    }

    let result = h
        .manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();
    assert_eq!(result.score, 0);
    assert_eq!(result.answers.len(), 1);
    assert_eq!(result.answers[0].response, "B");
}

#[tokio::test(start_paused = true)]
async fn test_attempt_limit_blocks_new_session() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    h.manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();
    assert_eq!(h.manager.session_count().await, 1);

    let err = h.manager.start(h.quiz.id, USER).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::AttemptLimitExceeded { allowed: 1, .. }
    ));
    assert_eq!(err.kind(), ErrorKind::AttemptLimitExceeded);
    assert_eq!(h.manager.session_count().await, 1);

    // Other users are unaffected.
    assert!(h.manager.start(h.quiz.id, USER + 1).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_attempt_numbers_increase_until_limit() {
    let h = harness(2).await;
    for expected in 1..=2 {
        let started = h.manager.start(h.quiz.id, USER).await.unwrap();
        assert_eq!(started.attempt_number, expected);
        assert_eq!(started.remaining_attempts, 2 - expected);
        h.manager
            .finalize_attempt(started.session_id, USER)
            .await
            .unwrap();
    }
    assert!(h.manager.start(h.quiz.id, USER).await.is_err());
    assert_eq!(h.results.count_attempts(USER, h.quiz.id).await.unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_resumes_unfinished_attempt() {
    let h = harness(3).await;
    let first = h.manager.start(h.quiz.id, USER).await.unwrap();
    tokio::time::advance(Duration::from_secs(20)).await;

    let second = h.manager.start(h.quiz.id, USER).await.unwrap();
    assert!(second.resumed);
    assert_eq!(second.session_id, first.session_id);
    assert_eq!(second.attempt_number, 1);
    assert_eq!(second.deadline, first.deadline);
    assert_eq!(second.remaining_seconds, 40);
    assert_eq!(h.manager.session_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_starts_share_one_session() {
    let h = harness(3).await;

    let barrier = Arc::new(tokio::sync::Barrier::new(8));
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = h.manager.clone();
            let barrier = barrier.clone();
            let quiz_id = h.quiz.id;
            tokio::spawn(async move {
                barrier.wait().await;
                manager.start(quiz_id, USER).await
            })
        })
        .collect();

    let mut started = Vec::new();
    for task in tasks {
        started.push(task.await.unwrap().unwrap());
    }

    let session_id = started[0].session_id;
    assert!(started.iter().all(|s| s.session_id == session_id));
    assert!(started.iter().all(|s| s.attempt_number == 1));
    assert_eq!(started.iter().filter(|s| !s.resumed).count(), 1);
    assert_eq!(h.manager.session_count().await, 1);
    assert_eq!(h.results.count_attempts(USER, h.quiz.id).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_lost_with_its_process_still_counts() {
    let catalog = Arc::new(MemoryQuizCatalog::new());
    let quiz = catalog.publish(&two_question_quiz(1)).await.unwrap();
    let results = Arc::new(MemoryResultStore::new());
    let boot = || {
        SessionManager::new(
            catalog.clone(),
            results.clone(),
            Arc::new(MonotonicClock::new()),
            EngineConfig::default(),
        )
    };

    let manager = boot();
    let started = manager.start(quiz.id, USER).await.unwrap();
    let record = manager
        .submit_answer(started.session_id, USER, quiz.questions[0].id, "A")
        .await
        .unwrap();
    assert!(record.is_correct);
    drop(manager);

    // A fresh process sees the unfinished attempt in the log.
    let manager = boot();
    assert_eq!(results.count_attempts(USER, quiz.id).await.unwrap(), 1);
    assert!(matches!(
        manager.start(quiz.id, USER).await,
        Err(EngineError::AttemptLimitExceeded { allowed: 1, .. })
    ));
    assert_eq!(manager.session_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_after_lost_one_gets_next_number() {
    let catalog = Arc::new(MemoryQuizCatalog::new());
    let quiz = catalog.publish(&two_question_quiz(2)).await.unwrap();
    let results = Arc::new(MemoryResultStore::new());

    let manager = SessionManager::new(
        catalog.clone(),
        results.clone(),
        Arc::new(MonotonicClock::new()),
        EngineConfig::default(),
    );
    manager.start(quiz.id, USER).await.unwrap();
    drop(manager);

    let manager = SessionManager::new(
        catalog,
        results,
        Arc::new(MonotonicClock::new()),
        EngineConfig::default(),
    );
    let started = manager.start(quiz.id, USER).await.unwrap();
    assert!(!started.resumed);
    assert_eq!(started.attempt_number, 2);
    assert_eq!(started.remaining_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_finalize_yields_one_result() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    h.manager
        .submit_answer(started.session_id, USER, h.quiz.questions[1].id, " Paris ")
        .await
        .unwrap();

    let (manual, timeout) = tokio::join!(
        h.manager.finalize(started.session_id, CompletionReason::Manual),
        h.manager.finalize(started.session_id, CompletionReason::Timeout),
    );
    let manual = manual.unwrap();
    assert_eq!(manual, timeout.unwrap());
    assert_eq!(manual.score, 5);
    assert_eq!(h.results.count_attempts(USER, h.quiz.id).await.unwrap(), 1);

    // Retrying returns the same result again.
    let again = h
        .manager
        .finalize(started.session_id, CompletionReason::Timeout)
        .await
        .unwrap();
    assert_eq!(again, manual);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_finalizers_store_once() {
    let h = harness_with(
        FlakyResultStore::default(),
        Arc::new(MonotonicClock::new()),
        EngineConfig::default(),
        1,
    )
    .await;
    let session_id = h.manager.start(h.quiz.id, USER).await.unwrap().session_id;

    let barrier = Arc::new(tokio::sync::Barrier::new(8));
    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let manager = h.manager.clone();
            let barrier = barrier.clone();
            let reason = if i % 2 == 0 {
                CompletionReason::Manual
            } else {
                CompletionReason::Timeout
            };
            tokio::spawn(async move {
                barrier.wait().await;
                manager.finalize(session_id, reason).await
            })
        })
        .collect();

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap().unwrap());
    }
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(h.results.attempted().len(), 1);
    assert_eq!(h.results.count_attempts(USER, h.quiz.id).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_answers_racing_finalize_are_never_lost() {
    let h = harness(1).await;
    let session_id = h.manager.start(h.quiz.id, USER).await.unwrap().session_id;

    let submits: Vec<_> = h
        .quiz
        .questions
        .iter()
        .map(|q| {
            let manager = h.manager.clone();
            let (question_id, response) = (q.id, q.answer.clone());
            tokio::spawn(async move {
                manager
                    .submit_answer(session_id, USER, question_id, &response)
                    .await
            })
        })
        .collect();
    let finalizer = {
        let manager = h.manager.clone();
        tokio::spawn(async move { manager.finalize_attempt(session_id, USER).await })
    };

    let accepted: Vec<_> = {
        let mut accepted = Vec::new();
        for task in submits {
            if let Ok(record) = task.await.unwrap() {
                accepted.push(record);
            }
        }
        accepted
    };
    let result = finalizer.await.unwrap().unwrap();

    for record in &accepted {
        assert!(result.answers.contains(record));
    }
    assert_eq!(result.answers.len(), accepted.len());
    assert_eq!(result.score, scoring::aggregate(&result.answers));
}

#[tokio::test(start_paused = true)]
async fn test_manual_submit_cancels_timeout() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    let manual = h
        .manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();
    assert_eq!(manual.completion_reason, CompletionReason::Manual);

    tokio::time::sleep(Duration::from_secs(120)).await;

    let stored = h.manager.result(started.session_id, USER).await.unwrap();
    assert_eq!(stored, manual);
    assert_eq!(h.results.count_attempts(USER, h.quiz.id).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_answer_after_deadline_is_rejected() {
    let clock = Arc::new(ManualClock::new());
    let h = harness_with(
        MemoryResultStore::new(),
        clock.clone(),
        EngineConfig::default(),
        1,
    )
    .await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();

    // Wall time passes the deadline before the watcher's timer fires.
    clock.advance(TimeDelta::seconds(61));

    let err = h
        .manager
        .submit_answer(started.session_id, USER, h.quiz.questions[0].id, "A")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionExpired(_)));

    let status = h.manager.status(started.session_id, USER).await.unwrap();
    assert_eq!(status.session.state, SessionState::InProgress);
    assert_eq!(status.remaining_seconds, 0);
    assert_eq!(status.answered, 0);
}

#[tokio::test(start_paused = true)]
async fn test_manual_submit_after_deadline_records_timeout() {
    let clock = Arc::new(ManualClock::new());
    let h = harness_with(
        MemoryResultStore::new(),
        clock.clone(),
        EngineConfig::default(),
        1,
    )
    .await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    h.manager
        .submit_answer(started.session_id, USER, h.quiz.questions[0].id, "A")
        .await
        .unwrap();

    // The watcher has not fired yet, but the clock is past the deadline.
    clock.advance(TimeDelta::seconds(61));

    let result = h
        .manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();
    assert_eq!(result.completion_reason, CompletionReason::Timeout);
    assert_eq!(result.score, 5);
}

#[tokio::test(start_paused = true)]
async fn test_validation_errors() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();

    let empty = h
        .manager
        .submit_answer(started.session_id, USER, h.quiz.questions[0].id, "  ")
        .await
        .unwrap_err();
    assert_eq!(empty.kind(), ErrorKind::Validation);

    let foreign = h
        .manager
        .submit_answer(started.session_id, USER, 9_999, "A")
        .await
        .unwrap_err();
    assert_eq!(foreign.kind(), ErrorKind::Validation);

    let unknown = h
        .manager
        .submit_answer(Uuid::new_v4(), USER, h.quiz.questions[0].id, "A")
        .await
        .unwrap_err();
    assert!(matches!(unknown, EngineError::SessionNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_sessions_are_private_to_their_user() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    let intruder = USER + 1;

    assert!(matches!(
        h.manager.status(started.session_id, intruder).await,
        Err(EngineError::SessionNotFound(_))
    ));
    assert!(matches!(
        h.manager
            .submit_answer(started.session_id, intruder, h.quiz.questions[0].id, "A")
            .await,
        Err(EngineError::SessionNotFound(_))
    ));
    assert!(matches!(
        h.manager.finalize_attempt(started.session_id, intruder).await,
        Err(EngineError::SessionNotFound(_))
    ));

    h.manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();
    assert!(matches!(
        h.manager.result(started.session_id, intruder).await,
        Err(EngineError::ResultNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_answers_rejected_once_completed() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    h.manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();

    let err = h
        .manager
        .submit_answer(started.session_id, USER, h.quiz.questions[0].id, "A")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyCompleted(_)));
    assert_eq!(err.kind(), ErrorKind::State);
}

#[tokio::test(start_paused = true)]
async fn test_failed_store_keeps_scored_result_for_retry() {
    let h = harness_with(
        FlakyResultStore::failing(1),
        Arc::new(MonotonicClock::new()),
        EngineConfig::default(),
        1,
    )
    .await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    h.manager
        .submit_answer(started.session_id, USER, h.quiz.questions[0].id, "A")
        .await
        .unwrap();

    let err = h
        .manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap_err();
    assert!(err.is_transient());

    let status = h.manager.status(started.session_id, USER).await.unwrap();
    assert_eq!(status.session.state, SessionState::Finalizing);
    assert!(matches!(
        h.manager
            .submit_answer(started.session_id, USER, h.quiz.questions[1].id, "Paris")
            .await,
        Err(EngineError::Finalizing(_))
    ));

    tokio::time::advance(Duration::from_secs(5)).await;
    let result = h
        .manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();

    // The retry stored the result scored by the failed attempt.
    let attempted = h.results.attempted();
    assert_eq!(attempted.len(), 2);
    assert_eq!(attempted[0], attempted[1]);
    assert_eq!(result, attempted[0]);
    assert_eq!(result.score, 5);
    assert_eq!(
        h.manager.status(started.session_id, USER).await.unwrap().session.state,
        SessionState::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn test_watcher_retries_transient_failures() {
    let config = EngineConfig {
        timeout_retry_backoff: Duration::from_secs(1),
        timeout_max_retries: 3,
        ..EngineConfig::default()
    };
    let h = harness_with(
        FlakyResultStore::failing(2),
        Arc::new(MonotonicClock::new()),
        config,
        1,
    )
    .await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();

    tokio::time::sleep(Duration::from_secs(65)).await;

    let result = h.manager.result(started.session_id, USER).await.unwrap();
    assert_eq!(result.completion_reason, CompletionReason::Timeout);
    assert_eq!(h.results.attempted().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_finalizes_sessions_the_watcher_gave_up_on() {
    let config = EngineConfig {
        timeout_retry_backoff: Duration::from_secs(1),
        timeout_max_retries: 1,
        ..EngineConfig::default()
    };
    let h = harness_with(
        FlakyResultStore::failing(2),
        Arc::new(MonotonicClock::new()),
        config,
        1,
    )
    .await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();

    tokio::time::sleep(Duration::from_secs(70)).await;
    let status = h.manager.status(started.session_id, USER).await.unwrap();
    assert_eq!(status.session.state, SessionState::Finalizing);

    let report = h.manager.sweep().await.unwrap();
    assert_eq!(report.finalized, 1);

    let result = h.manager.result(started.session_id, USER).await.unwrap();
    assert_eq!(result.completion_reason, CompletionReason::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_archives_completed_sessions() {
    let config = EngineConfig {
        session_retention: Duration::from_secs(10),
        ..EngineConfig::default()
    };
    let h = harness_with(
        MemoryResultStore::new(),
        Arc::new(MonotonicClock::new()),
        config,
        1,
    )
    .await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    let result = h
        .manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();

    assert_eq!(h.manager.sweep().await.unwrap().archived, 0);
    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(h.manager.sweep().await.unwrap().archived, 1);
    assert!(h.manager.session(started.session_id).await.is_none());

    // Finalize stays idempotent once the session object is gone.
    let again = h
        .manager
        .finalize(started.session_id, CompletionReason::Manual)
        .await
        .unwrap();
    assert_eq!(again, result);
    assert!(matches!(
        h.manager
            .submit_answer(started.session_id, USER, h.quiz.questions[0].id, "A")
            .await,
        Err(EngineError::AlreadyCompleted(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cleared_result_still_counts_as_attempt() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    h.manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();

    h.manager
        .clear_result(started.session_id, USER)
        .await
        .unwrap();
    assert!(matches!(
        h.manager.result(started.session_id, USER).await,
        Err(EngineError::ResultNotFound(_))
    ));
    assert!(matches!(
        h.manager.start(h.quiz.id, USER).await,
        Err(EngineError::AttemptLimitExceeded { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_expired_results_are_purged() {
    let config = EngineConfig {
        result_retention: Some(Duration::from_secs(30)),
        ..EngineConfig::default()
    };
    let h = harness_with(
        MemoryResultStore::new(),
        Arc::new(MonotonicClock::new()),
        config,
        2,
    )
    .await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    h.manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(h.manager.result(started.session_id, USER).await.is_err());
    assert_eq!(h.manager.sweep().await.unwrap().purged_results, 1);
}

#[tokio::test(start_paused = true)]
async fn test_questions_hide_answer_keys() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    let q1 = &h.quiz.questions[0];
    h.manager
        .submit_answer(started.session_id, USER, q1.id, "A")
        .await
        .unwrap();

    let view = h.manager.questions(started.session_id, USER).await.unwrap();
    assert_eq!(view.questions.len(), 2);
    assert_eq!(view.questions[0].question.id, q1.id);
    let feedback = view.questions[0].feedback.as_ref().unwrap();
    assert!(feedback.is_correct);
    assert!(view.questions[1].feedback.is_none());

    let json = serde_json::to_value(&view).unwrap();
    assert!(json["questions"][0].get("answer").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_completed_session_reports_no_time_left() {
    let h = harness(1).await;
    let started = h.manager.start(h.quiz.id, USER).await.unwrap();
    assert_eq!(
        h.manager
            .questions(started.session_id, USER)
            .await
            .unwrap()
            .remaining_seconds,
        60
    );

    h.manager
        .finalize_attempt(started.session_id, USER)
        .await
        .unwrap();

    let view = h.manager.questions(started.session_id, USER).await.unwrap();
    let status = h.manager.status(started.session_id, USER).await.unwrap();
    assert_eq!(view.remaining_seconds, 0);
    assert_eq!(status.remaining_seconds, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_quiz() {
    let h = harness(1).await;
    assert!(matches!(
        h.manager.start(404, USER).await,
        Err(EngineError::QuizNotFound(404))
    ));
}
