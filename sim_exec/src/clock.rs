//! # Simulation clock and termination protocol
//!
//! The clock task is the only writer of simulated time and the only task that
//! can end the run. Time advances by one tick per activation until the
//! configured horizon, then the [`TerminationToken`] is triggered exactly once.
//! Every other task polls the token at the head of each of its cycles and
//! leaves its loop when it is set, so a task stops at most one of its own
//! periods after the horizon.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

// Internal
use crate::monitors::{monitor, MonitorReader, MonitorWriter};
use crate::task::{Cycle, PeriodicTask, TaskError};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Trigger side of the cooperative cancellation flag.
///
/// The flag can only ever go from `false` to `true`. A run's token lives in
/// its [`ClockWriter`], tasks only ever see the flag through a
/// [`TerminationObserver`].
#[derive(Debug, Clone, Default)]
pub struct TerminationToken {
    inner: Arc<TokenInner>
}

/// Read-only view of the cancellation flag.
///
/// An observer has no way to set the flag:
///
/// ```compile_fail
/// let (_w, r) = sim_lib::clock::clock();
/// r.observer().trigger();
/// ```
#[derive(Debug, Clone)]
pub struct TerminationObserver {
    inner: Arc<TokenInner>
}

#[derive(Debug, Default)]
struct TokenInner {
    triggered: AtomicBool,

    /// Only written by the call that wins the transition, under its own
    /// lock
    triggered_at: Mutex<Option<Instant>>
}

/// Write side of the simulation clock, owned by the clock task.
#[derive(Debug)]
pub struct ClockWriter {
    time_s: MonitorWriter<f64>,
    token: TerminationToken
}

/// Read side of the simulation clock.
#[derive(Debug, Clone)]
pub struct ClockReader {
    time_s: MonitorReader<f64>,
    observer: TerminationObserver
}

/// The clock task.
pub struct ClockTask {
    writer: ClockWriter,

    tick: Duration,

    /// Tick period in seconds
    tick_s: f64,

    /// Index of the last tick whose time is inside the horizon
    horizon_ticks: u64,

    /// Number of ticks published so far
    num_ticks: u64
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl TerminationToken {
    /// Create a new, untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// token had already been triggered.
    pub fn trigger(&self) -> bool {
        // Hold the instant's lock across the transition so that anyone who
        // sees the flag set also sees the instant
        let mut triggered_at = self.inner.triggered_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let first = self.inner.triggered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if first {
            *triggered_at = Some(Instant::now());
        }

        first
    }

    /// Check whether the flag has been set.
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// Create a read-only view of the flag.
    pub fn observer(&self) -> TerminationObserver {
        TerminationObserver { inner: self.inner.clone() }
    }
}

impl TerminationObserver {
    /// Check whether the flag has been set.
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::Acquire)
    }

    /// The instant the flag was set at, if it has been.
    pub fn triggered_at(&self) -> Option<Instant> {
        *self.inner.triggered_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ClockWriter {
    /// Publish the current simulated time.
    pub fn set_time_s(&self, time_s: f64) {
        self.time_s.write(time_s);
    }

    /// End the simulation. Returns `true` on the first call only.
    pub fn terminate(&self) -> bool {
        self.token.trigger()
    }

    /// A second trigger handle, for whoever supervises the tasks and must be
    /// able to stop them before the horizon.
    pub fn token(&self) -> TerminationToken {
        self.token.clone()
    }

    /// Read-only view of the termination flag, for the task runners.
    pub fn observer(&self) -> TerminationObserver {
        self.token.observer()
    }

    /// Create a new read handle on the clock.
    pub fn reader(&self) -> ClockReader {
        ClockReader {
            time_s: self.time_s.reader(),
            observer: self.token.observer()
        }
    }
}

impl ClockReader {
    /// Current simulated time.
    ///
    /// Units: seconds
    pub fn time_s(&self) -> f64 {
        self.time_s.read()
    }

    /// True once the horizon has been reached.
    pub fn is_terminated(&self) -> bool {
        self.observer.is_triggered()
    }

    /// Read-only view of the termination flag.
    pub fn observer(&self) -> TerminationObserver {
        self.observer.clone()
    }
}

impl ClockTask {
    /// Create the clock task.
    ///
    /// `tick` and `horizon_s` must be positive, which parameter validation
    /// guarantees.
    pub fn new(writer: ClockWriter, tick: Duration, horizon_s: f64) -> Self {
        let tick_s = tick.as_secs_f64();

        Self {
            writer,
            tick,
            tick_s,
            horizon_ticks: num_whole_periods(horizon_s, tick_s),
            num_ticks: 0
        }
    }

    /// Simulated time published on the given tick.
    pub fn tick_time_s(&self, tick: u64) -> f64 {
        tick as f64 * self.tick_s
    }
}

impl PeriodicTask for ClockTask {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn period(&self) -> Duration {
        self.tick
    }

    fn cycle(&mut self) -> Result<Cycle, TaskError> {
        // Past the horizon: raise the flag and stop ticking
        if self.num_ticks > self.horizon_ticks {
            if self.writer.terminate() {
                info!(
                    "Simulation horizon reached, terminating after {:.2} s",
                    self.tick_time_s(self.num_ticks)
                );
            }
            return Ok(Cycle::Finished);
        }

        // Time is derived from the tick count, never accumulated
        let t = self.tick_time_s(self.num_ticks);
        self.writer.set_time_s(t);
        self.num_ticks += 1;

        trace!("Clock: t = {:.2}", t);

        Ok(Cycle::Continue)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create the simulation clock, starting at zero and not terminated.
pub fn clock() -> (ClockWriter, ClockReader) {
    let (w, r) = monitor(0f64);
    let token = TerminationToken::new();
    let observer = token.observer();

    (
        ClockWriter { time_s: w, token },
        ClockReader { time_s: r, observer }
    )
}

/// Number of whole `period_s` that fit in `span_s`, tolerating the rounding
/// of decimal periods such as 0.1 or 0.05.
pub fn num_whole_periods(span_s: f64, period_s: f64) -> u64 {
    let n = span_s / period_s;
    let rounded = n.round();

    if (n - rounded).abs() < 1e-9 * rounded.max(1.0) {
        rounded as u64
    }
    else {
        n.floor() as u64
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_token_transitions_once() {
        let token = TerminationToken::new();
        let other = token.clone();
        let observer = token.observer();

        assert!(!observer.is_triggered());
        assert!(observer.triggered_at().is_none());

        assert!(other.trigger());
        assert!(token.is_triggered());
        assert!(observer.is_triggered());
        let at = observer.triggered_at();
        assert!(at.is_some());

        // Later triggers never report a transition, nor move the instant
        assert!(!token.trigger());
        assert!(!other.trigger());
        assert!(observer.is_triggered());
        assert_eq!(observer.triggered_at(), at);
    }

    #[test]
    fn test_readers_only_observe() {
        let (w, r) = clock();
        let observer = r.observer();
        let from_writer = w.observer();

        assert!(!r.is_terminated());

        // The writer side is the only way to set the flag
        assert!(w.terminate());
        assert!(r.is_terminated());
        assert!(observer.is_triggered());
        assert!(from_writer.is_triggered());
        assert!(!w.token().trigger());
    }

    #[test]
    fn test_num_whole_periods() {
        assert_eq!(num_whole_periods(20.0, 0.1), 200);
        assert_eq!(num_whole_periods(20.0, 0.05), 400);
        assert_eq!(num_whole_periods(1.0, 0.03), 33);
        assert_eq!(num_whole_periods(0.3, 0.1), 3);
        assert_eq!(num_whole_periods(0.05, 0.1), 0);
    }

    #[test]
    fn test_clock_ticks_to_horizon() {
        let (w, r) = clock();
        let mut task = ClockTask::new(w, Duration::from_millis(100), 1.0);

        let mut published = Vec::new();
        loop {
            match task.cycle().unwrap() {
                Cycle::Continue => {
                    published.push(r.time_s());
                    assert!(!r.is_terminated());
                },
                Cycle::Finished => break
            }
        }

        // 0.0, 0.1, ..., 1.0 inclusive then termination
        assert_eq!(published.len(), 11);
        assert_eq!(published[0], 0.0);
        assert!((published[10] - 1.0).abs() < 1e-12);
        assert!(published.windows(2).all(|w| w[1] >= w[0]));
        assert!(r.is_terminated());

        // Further cycles keep reporting finished and do not move time
        assert_eq!(task.cycle().unwrap(), Cycle::Finished);
        assert!((r.time_s() - 1.0).abs() < 1e-12);
    }
}
