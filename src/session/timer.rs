// src/session/timer.rs
//! Wall-clock timer bookkeeping for the current question.
//!
//! The timer is never a decrementing counter: remaining time is recomputed
//! from persisted timestamps on every query, so it survives process restarts
//! and late expiry checks. `remaining_seconds` is authoritative only while
//! the clock is stopped; while running it is derived from `started_at`, the
//! accumulated pause gaps and the caller-supplied `now`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerState {
    pub is_active: bool,
    pub time_limit_seconds: u32,
    /// Checkpoint written whenever the clock stops.
    pub remaining_seconds: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    /// Accumulates monotonically across pause/resume cycles within one
    /// question; reset only when the next question's timer starts.
    pub total_paused_seconds: u64,
}

impl TimerState {
    pub fn start(time_limit_seconds: u32, now: DateTime<Utc>) -> Self {
        Self {
            is_active: true,
            time_limit_seconds,
            remaining_seconds: time_limit_seconds,
            started_at: Some(now),
            paused_at: None,
            total_paused_seconds: 0,
        }
    }

    /// Remaining time at `now`, derived purely from persisted fields.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u32 {
        let Some(started_at) = self.started_at else {
            return self.remaining_seconds;
        };
        // A paused timer is frozen at the instant it was paused.
        let observed = self.paused_at.unwrap_or(now);
        let elapsed = (observed - started_at).num_seconds() - self.total_paused_seconds as i64;
        let remaining = self.time_limit_seconds as i64 - elapsed.max(0);
        remaining.clamp(0, self.time_limit_seconds as i64) as u32
    }

    /// Idempotent: pausing an already-paused timer does not move `paused_at`.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
            self.is_active = false;
        }
    }

    /// Shifts the effective deadline forward by the pause duration, so the
    /// candidate never loses time to a pause.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.paused_at.take() {
            self.total_paused_seconds += (now - paused_at).num_seconds().max(0) as u64;
            self.is_active = true;
        }
    }

    /// Stops the clock, checkpoints the remaining time and returns the
    /// active answering seconds consumed, clamped to `[0, limit]`.
    pub fn stop(&mut self, now: DateTime<Utc>) -> u32 {
        let remaining = self.remaining_seconds(now);
        self.is_active = false;
        self.remaining_seconds = remaining;
        self.started_at = None;
        self.paused_at = None;
        self.time_limit_seconds - remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        "2024-03-01T09:00:00Z".parse().expect("timestamp")
    }

    #[test]
    fn remaining_counts_down_from_the_limit() {
        let timer = TimerState::start(60, t0());
        assert_eq!(timer.remaining_seconds(t0()), 60);
        assert_eq!(timer.remaining_seconds(t0() + Duration::seconds(25)), 35);
        assert_eq!(timer.remaining_seconds(t0() + Duration::seconds(60)), 0);
        assert_eq!(timer.remaining_seconds(t0() + Duration::seconds(500)), 0);
    }

    #[test]
    fn paused_timer_is_frozen() {
        let mut timer = TimerState::start(60, t0());
        timer.pause(t0() + Duration::seconds(10));
        // Any later observation reads the value at the pause instant.
        assert_eq!(timer.remaining_seconds(t0() + Duration::seconds(10)), 50);
        assert_eq!(timer.remaining_seconds(t0() + Duration::hours(3)), 50);
    }

    #[test]
    fn double_pause_does_not_move_the_pause_instant() {
        let mut timer = TimerState::start(60, t0());
        timer.pause(t0() + Duration::seconds(10));
        timer.pause(t0() + Duration::seconds(40));
        timer.resume(t0() + Duration::seconds(100));
        assert_eq!(timer.total_paused_seconds, 90);
        assert_eq!(timer.remaining_seconds(t0() + Duration::seconds(100)), 50);
    }

    #[test]
    fn pause_resume_is_time_neutral() {
        let mut timer = TimerState::start(20, t0());
        timer.pause(t0() + Duration::seconds(5));
        // An arbitrarily long pause costs no answering time.
        let resumed = t0() + Duration::days(2);
        timer.resume(resumed);
        assert_eq!(timer.remaining_seconds(resumed), 15);
        assert_eq!(timer.remaining_seconds(resumed + Duration::seconds(15)), 0);
    }

    #[test]
    fn multiple_pause_cycles_accumulate() {
        let mut timer = TimerState::start(120, t0());
        timer.pause(t0() + Duration::seconds(30));
        timer.resume(t0() + Duration::seconds(100)); // 70s paused
        timer.pause(t0() + Duration::seconds(110)); // 40s consumed
        timer.resume(t0() + Duration::seconds(500)); // 390s more paused
        assert_eq!(timer.total_paused_seconds, 460);
        assert_eq!(timer.remaining_seconds(t0() + Duration::seconds(500)), 80);
    }

    #[test]
    fn stop_checkpoints_and_reports_time_spent() {
        let mut timer = TimerState::start(60, t0());
        let spent = timer.stop(t0() + Duration::seconds(42));
        assert_eq!(spent, 42);
        assert!(!timer.is_active);
        assert_eq!(timer.remaining_seconds, 18);
        // Once stopped, the checkpoint is authoritative at any instant.
        assert_eq!(timer.remaining_seconds(t0() + Duration::hours(1)), 18);
    }

    #[test]
    fn stop_after_expiry_clamps_to_the_limit() {
        let mut timer = TimerState::start(20, t0());
        // Late expiry check: the poll arrives well past the deadline.
        let spent = timer.stop(t0() + Duration::seconds(300));
        assert_eq!(spent, 20);
        assert_eq!(timer.remaining_seconds, 0);
    }

    #[test]
    fn serde_round_trip_reproduces_remaining_time() {
        let mut timer = TimerState::start(60, t0());
        timer.pause(t0() + Duration::seconds(7));
        timer.resume(t0() + Duration::seconds(90));

        let json = serde_json::to_string(&timer).expect("serialize");
        let restored: TimerState = serde_json::from_str(&json).expect("deserialize");

        let probe = t0() + Duration::seconds(120);
        assert_eq!(restored.remaining_seconds(probe), timer.remaining_seconds(probe));
    }
}
