//! Trailing-edge throttle for cursor broadcasts.
//!
//! Time is passed in explicitly as a [`Duration`] since some fixed origin, so
//! callers decide which clock drives it and tests stay deterministic.

use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;
#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// Default minimum spacing between two cursor messages.
pub const CURSOR_THROTTLE_INTERVAL: Duration = Duration::from_millis(80);

/// Emits at most one value per interval. A value offered during the cool-down
/// replaces any earlier pending one and is released by [`Throttle::tick`] once
/// the interval has elapsed.
#[derive(Debug, Clone)]
pub struct Throttle<T> {
    interval: Duration,
    last_sent: Option<Duration>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn ready(&self, now: Duration) -> bool {
        match self.last_sent {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval,
        }
    }

    /// Offer a value. Returns it back if it may be sent right away, otherwise
    /// keeps it as the latest pending value.
    pub fn offer(&mut self, value: T, now: Duration) -> Option<T> {
        if self.ready(now) {
            self.pending = None;
            self.last_sent = Some(now);
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Release the pending value if the interval has elapsed.
    pub fn tick(&mut self, now: Duration) -> Option<T> {
        if self.pending.is_some() && self.ready(now) {
            self.last_sent = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    /// Drop any pending value without sending it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget timing and pending state.
    pub fn reset(&mut self) {
        self.last_sent = None;
        self.pending = None;
    }
}

impl<T> Default for Throttle<T> {
    fn default() -> Self {
        Self::new(CURSOR_THROTTLE_INTERVAL)
    }
}

/// Monotonic clock producing the timestamps the throttle expects.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Time since the clock was created.
    pub fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_first_offer_sends_immediately() {
        let mut throttle = Throttle::default();
        assert_eq!(throttle.offer(1, ms(0)), Some(1));
        assert_eq!(throttle.offer(2, ms(10)), None);
        assert!(throttle.has_pending());
    }

    #[test]
    fn test_one_message_per_window_and_trailing_flush() {
        let mut throttle = Throttle::new(ms(80));
        let mut sent = Vec::new();
        for t in (0..=200).step_by(10) {
            if let Some(v) = throttle.tick(ms(t)) {
                sent.push((t, v));
            }
            if let Some(v) = throttle.offer(t, ms(t)) {
                sent.push((t, v));
            }
        }
        if let Some(v) = throttle.tick(ms(240)) {
            sent.push((240, v));
        }

        let times: Vec<u64> = sent.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0, 80, 160, 240]);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= 80);
        }
        assert_eq!(sent.last().map(|(_, v)| *v), Some(200));
    }

    #[test]
    fn test_tick_waits_for_interval() {
        let mut throttle = Throttle::new(ms(80));
        throttle.offer("a", ms(0));
        throttle.offer("b", ms(30));
        assert_eq!(throttle.tick(ms(50)), None);
        assert_eq!(throttle.tick(ms(80)), Some("b"));
        assert_eq!(throttle.tick(ms(200)), None);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = Clock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_cancel_drops_pending() {
        let mut throttle = Throttle::new(ms(80));
        throttle.offer(1, ms(0));
        throttle.offer(2, ms(10));
        throttle.cancel();
        assert_eq!(throttle.tick(ms(100)), None);
    }
}
