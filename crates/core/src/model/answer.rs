use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnswerError {
    #[error("answer is empty")]
    Empty,
}

/// A submitted answer: an option letter for multiple choice, free text otherwise.
///
/// On the wire both shapes travel as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AnswerValue {
    Choice(char),
    Text(String),
}

impl AnswerValue {
    /// Interpret raw user input.
    ///
    /// A single ASCII letter is an option choice (normalized to upper case);
    /// anything else is free text with surrounding whitespace removed.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::Empty` for blank input.
    pub fn parse(raw: &str) -> Result<Self, AnswerError> {
        let trimmed = raw.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Err(AnswerError::Empty),
            (Some(c), None) if c.is_ascii_alphabetic() => Ok(Self::Choice(c.to_ascii_uppercase())),
            _ => Ok(Self::Text(trimmed.to_owned())),
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Choice(c) => write!(f, "{c}"),
            AnswerValue::Text(t) => f.write_str(t),
        }
    }
}

impl From<AnswerValue> for String {
    fn from(value: AnswerValue) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for AnswerValue {
    type Error = AnswerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// One question's submitted value.
///
/// The navigator only tracks *whether* a question was answered; the values
/// themselves live in the answer store until submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: QuestionId,
    #[serde(rename = "answer")]
    pub value: AnswerValue,
}

impl AnswerRecord {
    #[must_use]
    pub fn new(question_id: QuestionId, value: AnswerValue) -> Self {
        Self { question_id, value }
    }
}
