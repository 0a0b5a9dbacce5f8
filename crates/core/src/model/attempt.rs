use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AttemptId, QuestionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt has no questions")]
    NoQuestions,

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("attempt duration must be positive")]
    ZeroDuration,
}

/// The parameters of a timed test attempt, as handed over when the attempt begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    id: AttemptId,
    question_ids: Vec<QuestionId>,
    duration_secs: u32,
}

impl QuizAttempt {
    /// # Errors
    ///
    /// Returns `AttemptError::NoQuestions` for an empty question list,
    /// `AttemptError::DuplicateQuestion` if an id repeats, and
    /// `AttemptError::ZeroDuration` if no time is allotted.
    pub fn new(
        id: AttemptId,
        question_ids: Vec<QuestionId>,
        duration_secs: u32,
    ) -> Result<Self, AttemptError> {
        if question_ids.is_empty() {
            return Err(AttemptError::NoQuestions);
        }
        if duration_secs == 0 {
            return Err(AttemptError::ZeroDuration);
        }
        let mut seen = HashSet::with_capacity(question_ids.len());
        for qid in &question_ids {
            if !seen.insert(*qid) {
                return Err(AttemptError::DuplicateQuestion(*qid));
            }
        }
        Ok(Self {
            id,
            question_ids,
            duration_secs,
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.question_ids.len()
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }
}

/// Final score returned by the submission endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    pub attempt_id: AttemptId,
    pub score: f64,
    pub correct: u32,
    pub total: u32,
}
