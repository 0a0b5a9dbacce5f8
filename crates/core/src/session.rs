use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AttemptError, AttemptId, QuestionId, QuizAttempt};
use crate::navigation::{NavigationError, QuizNavigator, SlotState};
use crate::timer::{CountdownTimer, ResetKey, TickEvent, TickToken, format_time};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    /// The attempt is locked (expired) or already submitted.
    #[error("quiz session is closed")]
    SessionClosed,
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
}

//
// ─── STATE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Paused,
    /// Time ran out; answers are locked and only submission is allowed.
    Expired,
    /// Terminal.
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    Manual,
    TimeUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTick {
    Running { seconds_left: u32 },
    /// The countdown just hit zero and the session moved to `Expired`.
    Expired,
    Stale,
}

/// Proof that this session was submitted. Issued at most once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    pub attempt_id: AttemptId,
    pub trigger: SubmitTrigger,
    pub answered: Vec<QuestionId>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub elapsed_secs: u32,
}

/// Everything a view needs to draw the quiz header and navigator.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub current_index: usize,
    pub current_question: QuestionId,
    pub slots: Vec<SlotState>,
    pub answered_count: usize,
    pub seconds_left: u32,
    pub time_label: String,
    pub percentage: f64,
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// Controller for one timed attempt: countdown plus navigation, with a
/// single-shot submission.
#[derive(Debug, Clone)]
pub struct QuizSession {
    attempt_id: AttemptId,
    timer: CountdownTimer,
    navigator: QuizNavigator,
    state: SessionState,
    started_at: DateTime<Utc>,
}

impl QuizSession {
    /// Begin the attempt with the timer running.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Navigation` if the attempt carries no questions.
    pub fn start(attempt: &QuizAttempt, now: DateTime<Utc>) -> Result<Self, SessionError> {
        let navigator = QuizNavigator::new(attempt.question_ids().to_vec())?;
        let mut timer = CountdownTimer::new(attempt.duration_secs());
        timer.start();
        Ok(Self {
            attempt_id: attempt.id(),
            timer,
            navigator,
            state: SessionState::Active,
            started_at: now,
        })
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn timer(&self) -> &CountdownTimer {
        &self.timer
    }

    #[must_use]
    pub fn navigator(&self) -> &QuizNavigator {
        &self.navigator
    }

    /// Token for the next scheduled tick while the session is active.
    #[must_use]
    pub fn current_token(&self) -> Option<TickToken> {
        match self.state {
            SessionState::Active => self.timer.current_token(),
            _ => None,
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Active | SessionState::Paused => Ok(()),
            SessionState::Expired | SessionState::Submitted => Err(SessionError::SessionClosed),
        }
    }

    /// # Errors
    ///
    /// Returns `SessionError::SessionClosed` once expired or submitted, and
    /// `SessionError::Navigation` for an out-of-range index.
    pub fn navigate(&mut self, index: usize) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.navigator.navigate(index)?;
        Ok(())
    }

    /// # Errors
    ///
    /// See [`QuizSession::navigate`].
    pub fn next(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.navigator.next()?;
        Ok(())
    }

    /// # Errors
    ///
    /// See [`QuizSession::navigate`].
    pub fn previous(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.navigator.previous()?;
        Ok(())
    }

    /// Check that `question_id` could be answered now, without flagging it.
    ///
    /// # Errors
    ///
    /// Same as [`QuizSession::record_answer`].
    pub fn ensure_answerable(&self, question_id: QuestionId) -> Result<(), SessionError> {
        self.ensure_open()?;
        if !self.navigator.question_ids().contains(&question_id) {
            return Err(NavigationError::UnknownQuestion(question_id).into());
        }
        Ok(())
    }

    /// Flag `question_id` as answered.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionClosed` once expired or submitted, and
    /// `SessionError::Navigation` for a question outside this attempt.
    pub fn record_answer(&mut self, question_id: QuestionId) -> Result<bool, SessionError> {
        self.ensure_open()?;
        Ok(self.navigator.record_answer(question_id)?)
    }

    /// Pause the countdown. Pausing a paused session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionClosed` once expired or submitted.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.timer.pause();
        self.state = SessionState::Paused;
        Ok(())
    }

    /// Resume the countdown and return the token for the next tick.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionClosed` once expired or submitted.
    pub fn resume(&mut self) -> Result<Option<TickToken>, SessionError> {
        self.ensure_open()?;
        if self.state == SessionState::Active {
            return Ok(self.timer.current_token());
        }
        self.state = SessionState::Active;
        Ok(self.timer.resume())
    }

    /// Restart the countdown against a new duration without rebuilding the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionClosed` once expired or submitted, and
    /// `AttemptError::ZeroDuration` for a zero duration.
    pub fn reset_timer(&mut self, new_total: u32) -> Result<Option<TickToken>, SessionError> {
        self.ensure_open()?;
        if new_total == 0 {
            return Err(AttemptError::ZeroDuration.into());
        }
        Ok(self.timer.reset(new_total))
    }

    /// Restart the countdown when the externally supplied reset key changed.
    /// Returns whether a reset happened; the new token is `current_token()`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionClosed` once expired or submitted.
    pub fn sync_reset_key(&mut self, key: ResetKey) -> Result<bool, SessionError> {
        self.ensure_open()?;
        Ok(self.timer.sync_reset_key(key))
    }

    /// Apply one scheduled tick.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionClosed` after submission.
    pub fn tick(&mut self, token: TickToken) -> Result<SessionTick, SessionError> {
        if self.state == SessionState::Submitted {
            return Err(SessionError::SessionClosed);
        }
        Ok(match self.timer.tick(token) {
            TickEvent::Ticked { seconds_left } => SessionTick::Running { seconds_left },
            TickEvent::TimeUp => {
                self.state = SessionState::Expired;
                SessionTick::Expired
            }
            TickEvent::Stale => SessionTick::Stale,
        })
    }

    /// Move to `Submitted` and hand out the only ticket this session will issue.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionClosed` if a ticket was already issued.
    pub fn submit(
        &mut self,
        trigger: SubmitTrigger,
        now: DateTime<Utc>,
    ) -> Result<SubmissionTicket, SessionError> {
        if self.state == SessionState::Submitted {
            return Err(SessionError::SessionClosed);
        }
        self.timer.pause();
        self.state = SessionState::Submitted;
        Ok(SubmissionTicket {
            attempt_id: self.attempt_id,
            trigger,
            answered: self.navigator.answered_ids(),
            started_at: self.started_at,
            submitted_at: now,
            elapsed_secs: self.timer.elapsed(),
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let seconds_left = self.timer.seconds_left();
        SessionSnapshot {
            state: self.state,
            current_index: self.navigator.current_index(),
            current_question: self.navigator.current_question_id(),
            slots: self.navigator.slots(),
            answered_count: self.navigator.answered_count(),
            seconds_left,
            time_label: format_time(seconds_left),
            percentage: self.timer.percentage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn attempt(questions: u64, secs: u32) -> QuizAttempt {
        QuizAttempt::new(
            AttemptId::new(1),
            (1..=questions).map(QuestionId::new).collect(),
            secs,
        )
        .unwrap()
    }

    #[test]
    fn starts_active_with_a_token() {
        let session = QuizSession::start(&attempt(3, 60), fixed_now()).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.current_token().is_some());
        assert_eq!(session.snapshot().time_label, "01:00");
    }

    #[test]
    fn answerable_check_leaves_the_answered_set_alone() {
        let session = QuizSession::start(&attempt(2, 60), fixed_now()).unwrap();
        assert_eq!(session.ensure_answerable(QuestionId::new(2)), Ok(()));
        assert_eq!(
            session.ensure_answerable(QuestionId::new(9)),
            Err(SessionError::Navigation(NavigationError::UnknownQuestion(
                QuestionId::new(9)
            )))
        );
        assert_eq!(session.navigator().answered_count(), 0);
    }

    #[test]
    fn expiry_locks_then_allows_one_submission() {
        let mut session = QuizSession::start(&attempt(2, 2), fixed_now()).unwrap();
        session.record_answer(QuestionId::new(2)).unwrap();
        let token = session.current_token().unwrap();

        assert_eq!(
            session.tick(token).unwrap(),
            SessionTick::Running { seconds_left: 1 }
        );
        assert_eq!(session.tick(token).unwrap(), SessionTick::Expired);
        assert_eq!(session.state(), SessionState::Expired);

        assert_eq!(session.navigate(0), Err(SessionError::SessionClosed));
        assert_eq!(
            session.record_answer(QuestionId::new(1)),
            Err(SessionError::SessionClosed)
        );

        let ticket = session.submit(SubmitTrigger::TimeUp, fixed_now()).unwrap();
        assert_eq!(ticket.answered, vec![QuestionId::new(2)]);
        assert_eq!(ticket.elapsed_secs, 2);

        assert_eq!(
            session.submit(SubmitTrigger::Manual, fixed_now()),
            Err(SessionError::SessionClosed)
        );
    }

    #[test]
    fn submitted_session_rejects_everything() {
        let mut session = QuizSession::start(&attempt(2, 30), fixed_now()).unwrap();
        let token = session.current_token().unwrap();
        session.submit(SubmitTrigger::Manual, fixed_now()).unwrap();

        assert_eq!(session.state(), SessionState::Submitted);
        assert_eq!(session.tick(token), Err(SessionError::SessionClosed));
        assert_eq!(session.navigate(1), Err(SessionError::SessionClosed));
        assert_eq!(session.pause(), Err(SessionError::SessionClosed));
        assert_eq!(session.resume(), Err(SessionError::SessionClosed));
        assert_eq!(session.reset_timer(10), Err(SessionError::SessionClosed));
        assert_eq!(session.current_token(), None);
    }

    #[test]
    fn pause_and_resume_cycle() {
        let mut session = QuizSession::start(&attempt(1, 10), fixed_now()).unwrap();
        let token = session.current_token().unwrap();
        session.pause().unwrap();
        session.pause().unwrap();
        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(session.tick(token).unwrap(), SessionTick::Stale);

        let resumed = session.resume().unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(
            session.tick(resumed).unwrap(),
            SessionTick::Running { seconds_left: 9 }
        );
    }

    #[test]
    fn navigation_errors_pass_through() {
        let mut session = QuizSession::start(&attempt(2, 10), fixed_now()).unwrap();
        let err = session.navigate(5).unwrap_err();
        assert_eq!(
            err,
            SessionError::Navigation(NavigationError::OutOfRange { index: 5, total: 2 })
        );
        assert_eq!(session.navigator().current_index(), 0);
    }

    #[test]
    fn reset_timer_restarts_countdown() {
        let mut session = QuizSession::start(&attempt(1, 10), fixed_now()).unwrap();
        let old = session.current_token().unwrap();
        session.tick(old).unwrap();

        let fresh = session.reset_timer(45).unwrap().unwrap();
        assert_eq!(session.tick(old).unwrap(), SessionTick::Stale);
        assert_eq!(session.timer().seconds_left(), 45);
        assert_eq!(
            session.tick(fresh).unwrap(),
            SessionTick::Running { seconds_left: 44 }
        );
        assert!(matches!(
            session.reset_timer(0),
            Err(SessionError::Attempt(AttemptError::ZeroDuration))
        ));
    }

    #[test]
    fn changed_reset_key_restarts_countdown() {
        let mut session = QuizSession::start(&attempt(1, 10), fixed_now()).unwrap();
        let old = session.current_token().unwrap();
        session.tick(old).unwrap();

        assert!(!session.sync_reset_key(ResetKey::default()).unwrap());
        assert_eq!(session.timer().seconds_left(), 9);

        assert!(session.sync_reset_key(ResetKey::new(1)).unwrap());
        assert_eq!(session.timer().seconds_left(), 10);
        assert_eq!(session.tick(old).unwrap(), SessionTick::Stale);
        assert!(session.current_token().is_some());
    }

    #[test]
    fn snapshot_reflects_navigation() {
        let mut session = QuizSession::start(&attempt(3, 90), fixed_now()).unwrap();
        session.record_answer(QuestionId::new(1)).unwrap();
        session.next().unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.current_index, 1);
        assert_eq!(snap.current_question, QuestionId::new(2));
        assert_eq!(
            snap.slots,
            vec![SlotState::Answered, SlotState::Current, SlotState::Unanswered]
        );
        assert_eq!(snap.answered_count, 1);
        assert_eq!(snap.time_label, "01:30");
    }
}
