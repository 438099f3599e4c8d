//! General time utility functions and the periodic activation timer
//!
//! Periodic work in the simulator is driven by a [`PeriodicTimer`]. The timer
//! keeps an absolute target instant on the monotonic clock and advances it by
//! exactly one period per activation, so jitter and computation time never
//! accumulate into the effective period.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Absolute-deadline periodic timer.
#[derive(Debug, Clone)]
pub struct PeriodicTimer {
    period: Duration,

    /// The instant the current activation was scheduled for.
    next_activation: Instant,

    /// Number of activations that started after their deadline had passed.
    num_overruns: u64
}

/// Outcome of waiting for the next activation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activation {
    /// Slept until the activation instant.
    OnTime,

    /// The activation instant had already passed by the given amount.
    Overrun(Duration)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PeriodicTimer {
    /// Create a new timer whose first activation is now.
    pub fn new(period: Duration) -> Self {
        Self::starting_at(Instant::now(), period)
    }

    /// Create a new timer whose first activation is the given instant.
    pub fn starting_at(start: Instant, period: Duration) -> Self {
        Self {
            period,
            next_activation: start,
            num_overruns: 0
        }
    }

    /// The timer period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// The absolute instant of the pending activation.
    pub fn next_activation(&self) -> Instant {
        self.next_activation
    }

    /// Number of overrun activations so far.
    pub fn num_overruns(&self) -> u64 {
        self.num_overruns
    }

    /// Advance the target by one period and return it.
    ///
    /// The target is always derived from the previous target, never from the
    /// current time.
    pub fn advance(&mut self) -> Instant {
        self.next_activation += self.period;
        self.next_activation
    }

    /// Advance the target and block until it is reached.
    pub fn wait(&mut self) -> Activation {
        let target = self.advance();
        let now = Instant::now();

        match target.checked_duration_since(now) {
            Some(d) => {
                thread::sleep(d);
                Activation::OnTime
            },
            None => {
                self.num_overruns += 1;
                Activation::Overrun(now - target)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_targets_accumulate() {
        let start = Instant::now();
        let period = Duration::from_millis(30);
        let mut timer = PeriodicTimer::starting_at(start, period);

        for k in 1..=100u32 {
            assert_eq!(timer.advance(), start + period * k);
        }
    }

    #[test]
    fn test_overrun_keeps_target() {
        let start = Instant::now() - Duration::from_millis(500);
        let period = Duration::from_millis(50);
        let mut timer = PeriodicTimer::starting_at(start, period);

        // Target is well in the past, the timer reports it without re-basing
        match timer.wait() {
            Activation::Overrun(d) => assert!(d >= Duration::from_millis(400)),
            a => panic!("Expected an overrun, got {:?}", a)
        }
        assert_eq!(timer.num_overruns(), 1);
        assert_eq!(timer.next_activation(), start + period);
    }

    #[test]
    fn test_wait_sleeps_until_target() {
        let start = Instant::now();
        let mut timer = PeriodicTimer::starting_at(start, Duration::from_millis(20));

        for _ in 0..5 {
            timer.wait();
        }

        assert!(Instant::now() >= start + Duration::from_millis(100));
    }

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }
}
