// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::Validate;

pub type QuestionId = i64;

/// Options implied by a TRUE_FALSE question that was published without any.
pub const TRUE_FALSE_OPTIONS: [&str; 2] = ["True", "False"];

/// Kind of question, which decides how a response is marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Mcq,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::TrueFalse => "TRUE_FALSE",
            QuestionType::ShortAnswer => "SHORT_ANSWER",
        }
    }

    /// Whether the question is answered by picking one of its options.
    pub fn has_options(&self) -> bool {
        matches!(self, QuestionType::Mcq | QuestionType::TrueFalse)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MCQ" => Ok(QuestionType::Mcq),
            "TRUE_FALSE" => Ok(QuestionType::TrueFalse),
            "SHORT_ANSWER" => Ok(QuestionType::ShortAnswer),
            other => Err(format!("unknown question type '{other}'")),
        }
    }
}

/// A published question, including its answer key.
///
/// Never sent to attempt takers directly; see [`PublicQuestion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub quiz_id: i64,

    /// The text content of the question.
    pub content: String,

    #[serde(rename = "type")]
    pub question_type: QuestionType,

    /// Choices for MCQ / TRUE_FALSE questions, empty for SHORT_ANSWER.
    pub options: Vec<String>,

    /// Marks for a correct response. Always positive.
    pub marks: u32,

    /// The correct answer. For choice questions it is one of `options`.
    pub answer: String,
}

/// DTO for sending a question to an attempt taker (excludes the answer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub content: String,
    pub options: Vec<String>,
    pub marks: u32,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question_type: q.question_type,
            content: q.content.clone(),
            options: q.options.clone(),
            marks: q.marks,
        }
    }
}

/// DTO for a question inside a quiz being published.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = validate_answer_key))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(range(min = 1, max = 1000))]
    pub marks: u32,
    #[validate(length(min = 1, max = 500))]
    pub answer: String,
}

impl CreateQuestionRequest {
    /// Options as they will be published: TRUE_FALSE questions without
    /// explicit options get `["True", "False"]`.
    pub fn published_options(&self) -> Vec<String> {
        match self.question_type {
            QuestionType::TrueFalse if self.options.is_empty() => {
                TRUE_FALSE_OPTIONS.iter().map(|o| o.to_string()).collect()
            }
            QuestionType::ShortAnswer => Vec::new(),
            _ => self.options.clone(),
        }
    }

    /// The published form of this question once ids are assigned.
    pub fn to_question(&self, id: QuestionId, quiz_id: i64) -> Question {
        Question {
            id,
            quiz_id,
            content: self.content.clone(),
            question_type: self.question_type,
            options: self.published_options(),
            marks: self.marks,
            answer: self.answer.clone(),
        }
    }
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    for opt in options {
        if opt.is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_answer_key(q: &CreateQuestionRequest) -> Result<(), validator::ValidationError> {
    match q.question_type {
        QuestionType::ShortAnswer => {
            if q.answer.trim().is_empty() {
                return Err(validator::ValidationError::new("answer_cannot_be_blank"));
            }
        }
        QuestionType::Mcq | QuestionType::TrueFalse => {
            let options = q.published_options();
            if options.len() < 2 {
                return Err(validator::ValidationError::new("needs_at_least_two_options"));
            }
            if !options.contains(&q.answer) {
                return Err(validator::ValidationError::new("answer_not_among_options"));
            }
        }
    }
    Ok(())
}
