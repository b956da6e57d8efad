//! Two-sided countdown clock with per-move increment.
//!
//! The clock only measures time. It reports when the active side runs out and
//! leaves every other consequence to the owning match. The `*_at` methods take
//! an explicit instant so behaviour can be tested without sleeping.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::clock::time_control::TimeControl;
use crate::game_state::chess_types::Color;

#[derive(Debug, Clone)]
pub struct MatchClock {
    initial_ms: u64,
    increment_ms: u64,
    remaining_ms: [u64; 2],
    active: Option<Color>,
    last_tick_at: Option<Instant>,
    exhausted: bool,
}

/// Point-in-time view of both countdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub white: u64,
    pub black: u64,
    pub active_color: Option<Color>,
}

impl MatchClock {
    pub fn new(time_control: TimeControl) -> Self {
        Self::with_times(time_control.initial_ms(), time_control.increment_ms())
    }

    pub fn with_times(initial_ms: u64, increment_ms: u64) -> Self {
        Self {
            initial_ms,
            increment_ms,
            remaining_ms: [initial_ms; 2],
            active: None,
            last_tick_at: None,
            exhausted: false,
        }
    }

    #[inline]
    pub fn remaining(&self, color: Color) -> u64 {
        self.remaining_ms[color.index()]
    }

    #[inline]
    pub fn active_color(&self) -> Option<Color> {
        self.active
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.active.is_some() && !self.exhausted
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            white: self.remaining(Color::White),
            black: self.remaining(Color::Black),
            active_color: self.active,
        }
    }

    pub fn start(&mut self, color: Color) {
        self.start_at(color, Instant::now());
    }

    pub fn start_at(&mut self, color: Color, now: Instant) {
        self.active = Some(color);
        self.last_tick_at = Some(now);
    }

    pub fn tick(&mut self) -> Option<Color> {
        self.tick_at(Instant::now())
    }

    /// Charge the active side for time elapsed since the previous tick.
    ///
    /// Returns the side whose time ran out, exactly once per exhaustion.
    /// Only whole milliseconds are charged; the remainder carries over to the
    /// next tick.
    pub fn tick_at(&mut self, now: Instant) -> Option<Color> {
        if self.exhausted {
            return None;
        }
        let color = self.active?;
        let last = self.last_tick_at?;

        let elapsed_ms = now.saturating_duration_since(last).as_millis();
        let elapsed_ms = u64::try_from(elapsed_ms).unwrap_or(u64::MAX);
        let remaining = &mut self.remaining_ms[color.index()];
        let charged = elapsed_ms.min(*remaining);
        *remaining -= charged;
        self.last_tick_at = Some(last + Duration::from_millis(charged));

        if *remaining == 0 {
            self.exhausted = true;
            self.last_tick_at = Some(now);
            return Some(color);
        }
        None
    }

    pub fn switch_turn(&mut self, from: Color, to: Color) -> Option<Color> {
        self.switch_turn_at(from, to, Instant::now())
    }

    /// Finalise `from`'s spent time, credit its increment and hand the move to `to`.
    ///
    /// Returns a timeout that was detected while finalising, in which case no
    /// increment is credited and the clock stays on `from`.
    pub fn switch_turn_at(&mut self, from: Color, to: Color, now: Instant) -> Option<Color> {
        if let Some(flagged) = self.tick_at(now) {
            return Some(flagged);
        }
        let remaining = &mut self.remaining_ms[from.index()];
        *remaining = remaining.saturating_add(self.increment_ms);
        self.active = Some(to);
        self.last_tick_at = Some(now);
        None
    }

    /// Hand the clock to `color` without charging or crediting anyone.
    /// Used when a ply is taken back.
    pub fn rewind_to(&mut self, color: Color, now: Instant) {
        self.exhausted = self.remaining(color) == 0;
        self.active = Some(color);
        self.last_tick_at = Some(now);
    }

    /// Stop counting. Safe to call on a stopped clock.
    pub fn stop(&mut self) {
        self.active = None;
        self.last_tick_at = None;
    }

    /// Restore both sides to the initial allotment, stopped.
    pub fn reset(&mut self) {
        self.remaining_ms = [self.initial_ms; 2];
        self.exhausted = false;
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::MatchClock;
    use crate::clock::time_control::TimeControl;
    use crate::game_state::chess_types::Color;
    use std::time::{Duration, Instant};

    #[test]
    fn timeout_is_reported_exactly_once() {
        let mut clock = MatchClock::with_times(1_000, 0);
        let t0 = Instant::now();
        clock.start_at(Color::White, t0);

        assert_eq!(clock.tick_at(t0 + Duration::from_millis(400)), None);
        assert_eq!(clock.remaining(Color::White), 600);

        let late = t0 + Duration::from_millis(1_250);
        assert_eq!(clock.tick_at(late), Some(Color::White));
        assert_eq!(clock.remaining(Color::White), 0);
        assert_eq!(clock.tick_at(late + Duration::from_millis(100)), None);
        assert!(clock.is_exhausted());
    }

    #[test]
    fn switch_turn_credits_only_the_mover() {
        let mut clock = MatchClock::new(TimeControl::Blitz);
        let t0 = Instant::now();
        clock.start_at(Color::White, t0);

        assert_eq!(clock.switch_turn_at(Color::White, Color::Black, t0), None);
        assert_eq!(clock.remaining(Color::White), 182_000);
        assert_eq!(clock.remaining(Color::Black), 180_000);
        assert_eq!(clock.active_color(), Some(Color::Black));
    }

    #[test]
    fn only_the_active_side_is_charged() {
        let mut clock = MatchClock::with_times(10_000, 0);
        let t0 = Instant::now();
        clock.start_at(Color::White, t0);
        clock.switch_turn_at(Color::White, Color::Black, t0 + Duration::from_millis(1_500));
        clock.tick_at(t0 + Duration::from_millis(4_000));

        assert_eq!(clock.remaining(Color::White), 8_500);
        assert_eq!(clock.remaining(Color::Black), 7_500);
    }

    #[test]
    fn sub_millisecond_remainders_carry_over() {
        let mut clock = MatchClock::with_times(10_000, 0);
        let t0 = Instant::now();
        clock.start_at(Color::White, t0);
        clock.tick_at(t0 + Duration::from_micros(1_600));
        clock.tick_at(t0 + Duration::from_micros(3_200));
        assert_eq!(clock.remaining(Color::White), 9_997);
    }

    #[test]
    fn stopped_clock_does_not_run_and_stop_is_idempotent() {
        let mut clock = MatchClock::with_times(1_000, 0);
        let t0 = Instant::now();
        clock.start_at(Color::Black, t0);
        clock.stop();
        clock.stop();
        assert_eq!(clock.tick_at(t0 + Duration::from_secs(5)), None);
        assert_eq!(clock.remaining(Color::Black), 1_000);
        assert_eq!(clock.active_color(), None);
    }

    #[test]
    fn reset_restores_initial_times() {
        let mut clock = MatchClock::with_times(1_000, 500);
        let t0 = Instant::now();
        clock.start_at(Color::White, t0);
        clock.tick_at(t0 + Duration::from_secs(2));
        clock.reset();
        assert_eq!(clock.remaining(Color::White), 1_000);
        assert!(!clock.is_exhausted());
        assert!(!clock.is_running());
    }
}
