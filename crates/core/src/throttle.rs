//! Fixed-window rate gates.
//!
//! A gate lets an action through when at least one interval has elapsed
//! since the last action it let through. Rejected actions are not queued.

use std::time::Duration;

use crate::types::Timestamp;

/// Interval between emits for a rate in Hz. Rates below 1 Hz are raised to
/// 1 Hz.
pub fn interval_for_hz(hz: f64) -> Duration {
    let hz = if hz.is_finite() { hz.max(1.0) } else { 1.0 };
    Duration::from_secs_f64(1.0 / hz)
}

/// Last-pass timestamp for one throttled key.
#[derive(Debug, Clone, Default)]
pub struct WindowGate {
    last: Option<Timestamp>,
}

impl WindowGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` and records `now` if `interval` has elapsed since the
    /// previous pass (or there was none). A clock that moved backwards keeps
    /// the gate closed until it catches up.
    pub fn try_pass(&mut self, now: Timestamp, interval: Duration) -> bool {
        if let Some(last) = self.last {
            match (now - last).to_std() {
                Ok(elapsed) if elapsed >= interval => {}
                _ => return false,
            }
        }
        self.last = Some(now);
        true
    }

    pub fn last_pass(&self) -> Option<Timestamp> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t(ms: i64) -> Timestamp {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn first_call_passes() {
        let mut gate = WindowGate::new();
        assert!(gate.try_pass(t(0), Duration::from_secs(5)));
        assert_eq!(gate.last_pass(), Some(t(0)));
    }

    #[test]
    fn blocks_inside_window_and_passes_on_boundary() {
        let mut gate = WindowGate::new();
        let interval = Duration::from_millis(200);
        assert!(gate.try_pass(t(0), interval));
        assert!(!gate.try_pass(t(199), interval));
        assert!(gate.try_pass(t(200), interval));
        assert!(!gate.try_pass(t(300), interval));
    }

    #[test]
    fn rejected_calls_do_not_move_the_window() {
        let mut gate = WindowGate::new();
        let interval = Duration::from_millis(100);
        assert!(gate.try_pass(t(0), interval));
        for ms in (10..100).step_by(10) {
            assert!(!gate.try_pass(t(ms), interval));
        }
        assert!(gate.try_pass(t(100), interval));
    }

    #[test]
    fn backwards_clock_stays_closed() {
        let mut gate = WindowGate::new();
        let interval = Duration::from_millis(100);
        assert!(gate.try_pass(t(1_000), interval));
        assert!(!gate.try_pass(t(0), interval));
    }

    #[test]
    fn emitted_count_tracks_rate() {
        // 50 Hz input for 2 s through a 5 Hz gate.
        let mut gate = WindowGate::new();
        let interval = interval_for_hz(5.0);
        let emitted = (0..100).filter(|i| gate.try_pass(t(i * 20), interval)).count();
        let expected = 2.0 * 5.0;
        assert!((emitted as f64 - expected).abs() <= 1.0, "emitted {emitted}");
    }

    #[test]
    fn sub_hertz_rates_are_floored() {
        assert_eq!(interval_for_hz(0.2), Duration::from_secs(1));
        assert_eq!(interval_for_hz(f64::NAN), Duration::from_secs(1));
        assert_eq!(interval_for_hz(20.0), Duration::from_millis(50));
    }
}
