//! Countdown timer for a timed attempt.
//!
//! The timer never schedules anything itself. A driver asks for a
//! [`TickToken`], waits one second, and hands the token back to
//! [`CountdownTimer::tick`]. Every start, pause and reset bumps the timer's
//! generation, so a token issued before one of those calls is rejected as
//! [`TickEvent::Stale`] and cannot touch the new state.

use serde::{Deserialize, Serialize};

/// Permission to apply exactly one scheduled tick for a given timer generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickToken {
    generation: u64,
}

/// Opaque token whose change forces the timer back to its full duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResetKey(u64);

impl ResetKey {
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// One second elapsed; the countdown keeps running.
    Ticked { seconds_left: u32 },
    /// The countdown reached zero. Emitted once per reset cycle.
    TimeUp,
    /// The token predates a start, pause or reset and was ignored.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    total_seconds: u32,
    seconds_left: u32,
    running: bool,
    generation: u64,
    time_up_fired: bool,
    reset_key: ResetKey,
}

impl CountdownTimer {
    /// A paused timer holding the full duration.
    #[must_use]
    pub fn new(total_seconds: u32) -> Self {
        Self {
            total_seconds,
            seconds_left: total_seconds,
            running: false,
            generation: 0,
            time_up_fired: false,
            reset_key: ResetKey::default(),
        }
    }

    #[must_use]
    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    #[must_use]
    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True once the countdown has hit zero in the current reset cycle.
    #[must_use]
    pub fn is_time_up(&self) -> bool {
        self.time_up_fired
    }

    #[must_use]
    pub fn elapsed(&self) -> u32 {
        self.total_seconds - self.seconds_left
    }

    /// Remaining time as a percentage of the total, `0.0` for a zero-length timer.
    #[must_use]
    pub fn percentage(&self) -> f64 {
        if self.total_seconds == 0 {
            return 0.0;
        }
        100.0 * f64::from(self.seconds_left) / f64::from(self.total_seconds)
    }

    /// Token for the next tick, if the timer is running.
    #[must_use]
    pub fn current_token(&self) -> Option<TickToken> {
        self.running.then_some(TickToken {
            generation: self.generation,
        })
    }

    /// Start or resume the countdown.
    ///
    /// Any token handed out earlier is invalidated. Returns `None` when no
    /// time is left to count down.
    pub fn start(&mut self) -> Option<TickToken> {
        self.invalidate();
        if self.seconds_left == 0 {
            self.running = false;
            return None;
        }
        self.running = true;
        self.current_token()
    }

    pub fn resume(&mut self) -> Option<TickToken> {
        self.start()
    }

    /// Freeze the countdown. Outstanding tokens become stale.
    pub fn pause(&mut self) {
        self.invalidate();
        self.running = false;
    }

    /// Restart against `new_total` seconds, keeping the running flag.
    ///
    /// Rearms the time-up notification and returns the token for the next
    /// tick when the timer is still running.
    pub fn reset(&mut self, new_total: u32) -> Option<TickToken> {
        self.invalidate();
        self.total_seconds = new_total;
        self.seconds_left = new_total;
        self.time_up_fired = false;
        if new_total == 0 {
            self.running = false;
        }
        self.current_token()
    }

    /// Reset against the current total when `key` differs from the last key seen.
    ///
    /// Returns whether a reset happened.
    pub fn sync_reset_key(&mut self, key: ResetKey) -> bool {
        if key == self.reset_key {
            return false;
        }
        self.reset_key = key;
        self.reset(self.total_seconds);
        true
    }

    /// Apply one scheduled tick.
    pub fn tick(&mut self, token: TickToken) -> TickEvent {
        if !self.running || token.generation != self.generation {
            return TickEvent::Stale;
        }

        self.seconds_left = self.seconds_left.saturating_sub(1);
        if self.seconds_left > 0 {
            return TickEvent::Ticked {
                seconds_left: self.seconds_left,
            };
        }

        self.running = false;
        self.invalidate();
        if self.time_up_fired {
            return TickEvent::Stale;
        }
        self.time_up_fired = true;
        TickEvent::TimeUp
    }

    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Render seconds as `MM:SS`. Minutes are not wrapped at 60.
#[must_use]
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to_end(timer: &mut CountdownTimer, token: TickToken) -> (u32, u32) {
        let mut ticks = 0;
        let mut time_ups = 0;
        for _ in 0..timer.total_seconds() + 3 {
            match timer.tick(token) {
                TickEvent::Ticked { .. } => ticks += 1,
                TickEvent::TimeUp => time_ups += 1,
                TickEvent::Stale => {}
            }
        }
        (ticks, time_ups)
    }

    #[test]
    fn runs_down_to_zero_with_single_time_up() {
        for total in [1_u32, 2, 5, 61] {
            let mut timer = CountdownTimer::new(total);
            let token = timer.start().unwrap();
            let (ticks, time_ups) = run_to_end(&mut timer, token);
            assert_eq!(timer.seconds_left(), 0);
            assert_eq!(ticks, total - 1);
            assert_eq!(time_ups, 1);
            assert!(!timer.is_running());
            assert_eq!(timer.elapsed(), total);
        }
    }

    #[test]
    fn pause_freezes_and_rejects_old_tokens() {
        let mut timer = CountdownTimer::new(10);
        let token = timer.start().unwrap();
        assert_eq!(timer.tick(token), TickEvent::Ticked { seconds_left: 9 });

        timer.pause();
        assert_eq!(timer.tick(token), TickEvent::Stale);
        assert_eq!(timer.seconds_left(), 9);
        assert_eq!(timer.current_token(), None);

        let resumed = timer.resume().unwrap();
        assert_ne!(resumed, token);
        assert_eq!(timer.tick(token), TickEvent::Stale);
        assert_eq!(timer.tick(resumed), TickEvent::Ticked { seconds_left: 8 });
    }

    #[test]
    fn paused_timer_never_reports_time_up() {
        let mut timer = CountdownTimer::new(1);
        let token = timer.start().unwrap();
        timer.pause();
        assert_eq!(timer.tick(token), TickEvent::Stale);
        assert!(!timer.is_time_up());
    }

    #[test]
    fn reset_reinitializes_and_drops_pending_tick() {
        let mut timer = CountdownTimer::new(5);
        let old = timer.start().unwrap();
        timer.tick(old);
        timer.tick(old);

        let fresh = timer.reset(30).unwrap();
        assert_eq!(timer.seconds_left(), 30);
        assert_eq!(timer.tick(old), TickEvent::Stale);
        assert_eq!(timer.seconds_left(), 30);
        assert_eq!(timer.tick(fresh), TickEvent::Ticked { seconds_left: 29 });
    }

    #[test]
    fn reset_after_time_up_rearms_notification() {
        let mut timer = CountdownTimer::new(1);
        let token = timer.start().unwrap();
        assert_eq!(timer.tick(token), TickEvent::TimeUp);

        assert_eq!(timer.reset(1), None);
        let token = timer.start().unwrap();
        assert_eq!(timer.tick(token), TickEvent::TimeUp);
    }

    #[test]
    fn start_with_nothing_left_does_not_run() {
        let mut timer = CountdownTimer::new(0);
        assert_eq!(timer.start(), None);
        assert!(!timer.is_running());
        assert!(!timer.is_time_up());
    }

    #[test]
    fn reset_key_only_resets_on_change() {
        let mut timer = CountdownTimer::new(20);
        let token = timer.start().unwrap();
        timer.tick(token);

        assert!(!timer.sync_reset_key(ResetKey::default()));
        assert_eq!(timer.seconds_left(), 19);

        let key = ResetKey::default().next();
        assert!(timer.sync_reset_key(key));
        assert_eq!(timer.seconds_left(), 20);
        assert_eq!(timer.tick(token), TickEvent::Stale);
        assert!(!timer.sync_reset_key(key));
    }

    #[test]
    fn percentage_guards_zero_total() {
        assert!((CountdownTimer::new(0).percentage() - 0.0).abs() < f64::EPSILON);

        let mut timer = CountdownTimer::new(4);
        let token = timer.start().unwrap();
        timer.tick(token);
        assert!((timer.percentage() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(3600), "60:00");
        assert_eq!(format_time(6001), "100:01");
    }
}
