//! Append-only answer ledger for one session.

use std::{collections::HashMap, sync::OnceLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    engine::{error::EngineError, scoring},
    models::{
        answer::AnswerRecord,
        question::{Question, QuestionId},
        quiz::Quiz,
    },
};

/// One write-once slot per question of the session's quiz.
///
/// Slots are independent, so answers to different questions never contend,
/// and a slot that is already filled rejects every later write.
#[derive(Debug)]
pub struct AnswerLedger {
    session_id: Uuid,
    order: Vec<QuestionId>,
    slots: HashMap<QuestionId, OnceLock<AnswerRecord>>,
}

impl AnswerLedger {
    pub fn new(session_id: Uuid, quiz: &Quiz) -> Self {
        let order: Vec<QuestionId> = quiz.questions.iter().map(|q| q.id).collect();
        let slots = order.iter().map(|id| (*id, OnceLock::new())).collect();
        Self {
            session_id,
            order,
            slots,
        }
    }

    /// Scores `response` and stores it as the answer to `question`.
    ///
    /// Returns [`EngineError::AlreadyAnswered`] carrying the stored record if
    /// the question was answered before; the stored record is left untouched.
    pub fn record(
        &self,
        question: &Question,
        response: &str,
        now: DateTime<Utc>,
    ) -> Result<AnswerRecord, EngineError> {
        if response.trim().is_empty() {
            return Err(EngineError::Validation("response must not be empty".into()));
        }

        let slot = self.slots.get(&question.id).ok_or_else(|| {
            EngineError::Validation(format!(
                "question {} is not part of this quiz",
                question.id
            ))
        })?;

        let mut inserted = false;
        let stored = slot.get_or_init(|| {
            inserted = true;
            let marking = scoring::score(question, response);
            AnswerRecord {
                session_id: self.session_id,
                question_id: question.id,
                response: response.to_string(),
                is_correct: marking.is_correct,
                marks_awarded: marking.marks_awarded,
                submitted_at: now,
            }
        });

        if inserted {
            Ok(stored.clone())
        } else {
            Err(EngineError::AlreadyAnswered(Box::new(stored.clone())))
        }
    }

    pub fn get(&self, question_id: QuestionId) -> Option<&AnswerRecord> {
        self.slots.get(&question_id).and_then(OnceLock::get)
    }

    pub fn answered(&self) -> usize {
        self.slots.values().filter(|slot| slot.get().is_some()).count()
    }

    /// Every stored answer, in quiz question order.
    pub fn snapshot(&self) -> Vec<AnswerRecord> {
        self.order
            .iter()
            .filter_map(|id| self.get(*id).cloned())
            .collect()
    }

    /// Current score, always derived from the stored answers.
    pub fn score(&self) -> u32 {
        scoring::aggregate(self.order.iter().filter_map(|id| self.get(*id)))
    }
}
