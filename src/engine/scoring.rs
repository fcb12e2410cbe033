//! Marking rules. Pure functions, no state.

use crate::models::{
    answer::AnswerRecord,
    question::{Question, QuestionType},
};

/// Outcome of marking one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marking {
    pub is_correct: bool,
    pub marks_awarded: u32,
}

/// Marks a response against the question's answer key.
///
/// * MCQ / TRUE_FALSE: exact, case-sensitive match.
/// * SHORT_ANSWER: exact match once both sides are trimmed.
///
/// Full marks or nothing; there is no partial credit.
pub fn score(question: &Question, response: &str) -> Marking {
    let is_correct = match question.question_type {
        QuestionType::Mcq | QuestionType::TrueFalse => response == question.answer,
        QuestionType::ShortAnswer => response.trim() == question.answer.trim(),
    };

    Marking {
        is_correct,
        marks_awarded: if is_correct { question.marks } else { 0 },
    }
}

/// Total marks across a set of answers.
pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a AnswerRecord>) -> u32 {
    records.into_iter().map(|r| r.marks_awarded).sum()
}
