use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use quiz_core::model::{AnswerRecord, AnswerValue, QuestionId, QuizAttempt, SubmissionSummary};
use quiz_core::{
    Clock, QuizSession, ResetKey, SessionSnapshot, SessionState, SessionTick, SubmissionTicket,
    SubmitTrigger, TickToken,
};
use storage::repository::AnswerRepository;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{QuizError, SubmissionError};
use crate::submission::AttemptSubmitter;

const EVENT_CAPACITY: usize = 64;

/// Notifications for whoever renders the quiz.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizEvent {
    Tick { seconds_left: u32 },
    Paused,
    Resumed,
    TimerReset { seconds_left: u32 },
    /// Time ran out. Sent before the automatic submission call starts.
    Expired,
    Submitted {
        trigger: SubmitTrigger,
        summary: SubmissionSummary,
    },
    SubmissionFailed {
        trigger: SubmitTrigger,
        auth_expired: bool,
        message: String,
    },
}

/// Drives a `QuizSession` on the tokio runtime.
///
/// One ticker task at a time applies a tick per `tick_period`. Pause, reset
/// and submission abort the ticker and invalidate its token while holding the
/// session lock, so a tick scheduled earlier can never land on the new state.
/// Submission is claimed under the same lock, which makes time-up and manual
/// submission mutually exclusive: exactly one of them reaches the submitter.
pub struct QuizRunner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    session: Mutex<QuizSession>,
    ticker: StdMutex<Option<JoinHandle<()>>>,
    /// Time-up submission, detached from the ticker so dropping the runner cannot cancel it.
    delivery: StdMutex<Option<JoinHandle<()>>>,
    failed: StdMutex<Option<SubmissionTicket>>,
    clock: Clock,
    tick_period: Duration,
    answers: Arc<dyn AnswerRepository>,
    submitter: Arc<dyn AttemptSubmitter>,
    events: broadcast::Sender<QuizEvent>,
}

impl QuizRunner {
    /// Start the attempt and its countdown. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` if the session cannot be created.
    pub fn start(
        attempt: &QuizAttempt,
        clock: Clock,
        tick_period: Duration,
        answers: Arc<dyn AnswerRepository>,
        submitter: Arc<dyn AttemptSubmitter>,
    ) -> Result<Self, QuizError> {
        let session = QuizSession::start(attempt, clock.now())?;
        let token = session.current_token();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let inner = Arc::new(RunnerInner {
            session: Mutex::new(session),
            ticker: StdMutex::new(None),
            delivery: StdMutex::new(None),
            failed: StdMutex::new(None),
            clock,
            tick_period,
            answers,
            submitter,
            events,
        });
        if let Some(token) = token {
            inner.spawn_ticker(token);
        }
        info!(
            attempt = %attempt.id(),
            questions = attempt.total_questions(),
            seconds = attempt.duration_secs(),
            "quiz attempt started"
        );
        Ok(Self { inner })
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QuizEvent> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.session.lock().await.snapshot()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.session.lock().await.state()
    }

    /// # Errors
    ///
    /// Returns `QuizError::Session` for out-of-range indices or a closed session.
    pub async fn navigate(&self, index: usize) -> Result<(), QuizError> {
        Ok(self.inner.session.lock().await.navigate(index)?)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Session` on the last question or a closed session.
    pub async fn next(&self) -> Result<(), QuizError> {
        Ok(self.inner.session.lock().await.next()?)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Session` on the first question or a closed session.
    pub async fn previous(&self) -> Result<(), QuizError> {
        Ok(self.inner.session.lock().await.previous()?)
    }

    /// Record an answer: store its value, then flag the question.
    ///
    /// The session lock is held across both steps, so a submission claimed
    /// concurrently either sees both or neither. A question is only flagged
    /// once its value is stored.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` for a closed session or unknown question and
    /// `QuizError::Storage` if the value cannot be stored.
    pub async fn answer(
        &self,
        question_id: QuestionId,
        value: AnswerValue,
    ) -> Result<(), QuizError> {
        let mut session = self.inner.session.lock().await;
        session.ensure_answerable(question_id)?;
        let record = AnswerRecord::new(question_id, value);
        self.inner
            .answers
            .save_answer(session.attempt_id(), &record)
            .await?;
        session.record_answer(question_id)?;
        Ok(())
    }

    /// Answer whichever question is currently shown.
    ///
    /// # Errors
    ///
    /// See [`QuizRunner::answer`].
    pub async fn answer_current(&self, value: AnswerValue) -> Result<QuestionId, QuizError> {
        let question_id = self
            .inner
            .session
            .lock()
            .await
            .navigator()
            .current_question_id();
        self.answer(question_id, value).await?;
        Ok(question_id)
    }

    /// # Errors
    ///
    /// Returns `QuizError::Session` once expired or submitted.
    pub async fn pause(&self) -> Result<(), QuizError> {
        let mut session = self.inner.session.lock().await;
        session.pause()?;
        self.inner.abort_ticker();
        drop(session);
        self.inner.emit(QuizEvent::Paused);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `QuizError::Session` once expired or submitted.
    pub async fn resume(&self) -> Result<(), QuizError> {
        let mut session = self.inner.session.lock().await;
        let was_paused = session.state() == SessionState::Paused;
        let token = session.resume()?;
        if was_paused {
            self.inner.restart_ticker(token);
        }
        drop(session);
        if was_paused {
            self.inner.emit(QuizEvent::Resumed);
        }
        Ok(())
    }

    /// Restart the countdown against `seconds`.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` once expired or submitted, or for zero seconds.
    pub async fn reset_timer(&self, seconds: u32) -> Result<(), QuizError> {
        let mut session = self.inner.session.lock().await;
        let token = session.reset_timer(seconds)?;
        self.inner.restart_ticker(token);
        drop(session);
        self.inner.emit(QuizEvent::TimerReset {
            seconds_left: seconds,
        });
        Ok(())
    }

    /// Restart the countdown if `key` differs from the last key applied.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` once expired or submitted.
    pub async fn sync_reset_key(&self, key: ResetKey) -> Result<(), QuizError> {
        let mut session = self.inner.session.lock().await;
        if !session.sync_reset_key(key)? {
            return Ok(());
        }
        self.inner.restart_ticker(session.current_token());
        let seconds_left = session.timer().seconds_left();
        drop(session);
        self.inner.emit(QuizEvent::TimerReset { seconds_left });
        Ok(())
    }

    /// Submit now.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session(SessionClosed)` if the attempt was already
    /// submitted (by the timer or an earlier call), and `QuizError::Submission`
    /// if the submission call fails. A failed submission can be resent with
    /// [`QuizRunner::retry_submission`].
    pub async fn submit(&self) -> Result<SubmissionSummary, QuizError> {
        let ticket = {
            let mut session = self.inner.session.lock().await;
            let ticket = session.submit(SubmitTrigger::Manual, self.inner.clock.now())?;
            self.inner.abort_ticker();
            ticket
        };
        Ok(self.inner.deliver(ticket).await?)
    }

    /// Resend the ticket of the last failed submission.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NothingToRetry` if no submission failed, and
    /// `QuizError::Submission` if it fails again.
    pub async fn retry_submission(&self) -> Result<SubmissionSummary, QuizError> {
        let ticket = self
            .inner
            .failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(QuizError::NothingToRetry)?;
        Ok(self.inner.deliver(ticket).await?)
    }

    /// Wait until an automatic time-up submission has been delivered or has failed.
    ///
    /// Returns at once if none is in flight.
    pub async fn finish(&self) {
        let delivery = self
            .inner
            .delivery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(delivery) = delivery else {
            return;
        };
        if let Err(err) = delivery.await {
            warn!(error = %err, "time-up submission task failed");
        }
    }
}

impl Drop for QuizRunner {
    fn drop(&mut self) {
        self.inner.abort_ticker();
    }
}

impl RunnerInner {
    fn emit(&self, event: QuizEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn spawn_ticker(self: &Arc<Self>, token: TickToken) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.run_ticks(token).await });
        let previous = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn abort_ticker(&self) {
        let handle = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    fn restart_ticker(self: &Arc<Self>, token: Option<TickToken>) {
        self.abort_ticker();
        if let Some(token) = token {
            self.spawn_ticker(token);
        }
    }

    async fn run_ticks(self: Arc<Self>, token: TickToken) {
        let period = self.tick_period;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let mut session = self.session.lock().await;
            match session.tick(token) {
                Ok(SessionTick::Running { seconds_left }) => {
                    drop(session);
                    self.emit(QuizEvent::Tick { seconds_left });
                }
                Ok(SessionTick::Expired) => {
                    let attempt = session.attempt_id();
                    info!(%attempt, "time is up");
                    self.emit(QuizEvent::Expired);
                    match session.submit(SubmitTrigger::TimeUp, self.clock.now()) {
                        Ok(ticket) => {
                            // Stored under the session lock: anyone who sees the
                            // session closed by this claim can wait on it.
                            let inner = Arc::clone(&self);
                            let delivery = tokio::spawn(async move {
                                // Failure is already reported through the event stream.
                                let _ = inner.deliver(ticket).await;
                            });
                            *self.delivery.lock().unwrap_or_else(PoisonError::into_inner) =
                                Some(delivery);
                        }
                        Err(err) => debug!(%attempt, error = %err, "expiry after submission"),
                    }
                    return;
                }
                Ok(SessionTick::Stale) | Err(_) => return,
            }
        }
    }

    async fn deliver(
        &self,
        ticket: SubmissionTicket,
    ) -> Result<SubmissionSummary, SubmissionError> {
        let trigger = ticket.trigger;
        match self.submitter.submit(&ticket).await {
            Ok(summary) => {
                self.emit(QuizEvent::Submitted {
                    trigger,
                    summary: summary.clone(),
                });
                Ok(summary)
            }
            Err(err) => {
                warn!(attempt = %ticket.attempt_id, error = %err, "submission failed");
                // Retryable before anyone hears about the failure.
                *self.failed.lock().unwrap_or_else(PoisonError::into_inner) = Some(ticket);
                self.emit(QuizEvent::SubmissionFailed {
                    trigger,
                    auth_expired: err.is_auth_expired(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }
}
