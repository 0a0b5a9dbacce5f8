use std::sync::Arc;
use std::time::Duration;

use quiz_core::Clock;
use quiz_core::model::QuizAttempt;
use storage::repository::AnswerRepository;

use crate::error::QuizError;
use crate::quiz::QuizRunner;
use crate::submission::AttemptSubmitter;

/// Builds `QuizRunner`s that share one answer store and one submitter.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    tick_period: Duration,
    answers: Arc<dyn AnswerRepository>,
    submitter: Arc<dyn AttemptSubmitter>,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        answers: Arc<dyn AnswerRepository>,
        submitter: Arc<dyn AttemptSubmitter>,
    ) -> Self {
        Self {
            clock,
            tick_period: Duration::from_secs(1),
            answers,
            submitter,
        }
    }

    #[must_use]
    pub fn with_tick_period(mut self, tick_period: Duration) -> Self {
        self.tick_period = tick_period;
        self
    }

    /// Begin a timed attempt, discarding any answers stored for it earlier.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Storage` if stale answers cannot be cleared and
    /// `QuizError::Session` if the session cannot start.
    pub async fn start(&self, attempt: &QuizAttempt) -> Result<QuizRunner, QuizError> {
        self.answers.clear(attempt.id()).await?;
        QuizRunner::start(
            attempt,
            self.clock,
            self.tick_period,
            Arc::clone(&self.answers),
            Arc::clone(&self.submitter),
        )
    }
}
