//! # Periodic task runner
//!
//! Every task in the simulator runs on its own named native thread with the
//! same loop:
//!
//! 1. Check the termination token, leave if it is set.
//! 2. Run one cycle: read the monitors it consumes (one lock at a time),
//!    compute with no lock held, write the monitors it owns.
//! 3. Advance the absolute activation target by one period and sleep until
//!    it.
//!
//! Tasks do not synchronise with each other beyond the monitors. A consumer
//! simply reads whatever its producer last wrote.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{error, info, warn};
use serde::Serialize;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

// Internal
use crate::clock::TerminationObserver;
use util::archive::ArchiveError;
use util::time::{Activation, PeriodicTimer};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A task executed periodically by [`run`].
pub trait PeriodicTask: Send {
    /// Name of the task, also used as the thread name.
    fn name(&self) -> &'static str;

    /// Nominal activation period.
    fn period(&self) -> Duration;

    /// Execute one activation of the task.
    fn cycle(&mut self) -> Result<Cycle, TaskError>;
}

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Summary of one task's execution.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub name: &'static str,

    /// Nominal period in seconds
    pub period_s: f64,

    /// Number of cycles executed
    pub num_cycles: u64,

    /// Number of activations which started after their deadline
    pub num_overruns: u64,

    /// Why the task stopped
    pub exit: ExitReason,

    /// Time between the termination token being triggered and the task
    /// leaving its loop, if the task stopped because of the token.
    pub shutdown_latency_s: Option<f64>
}

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// Result of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// Keep running.
    Continue,

    /// The task has nothing more to do and leaves its loop.
    Finished
}

/// Reason a task stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExitReason {
    /// The termination token was observed.
    Terminated,

    /// The task finished on its own.
    Finished,

    /// The task hit a fatal error and stopped itself.
    Failed(String)
}

/// Fatal errors that end a single task.
///
/// These never propagate to other tasks: the failing task logs the error and
/// leaves its loop, the rest of the simulator carries on.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Processing error: {0}")]
    Step(#[from] crate::StepError)
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl<T: PeriodicTask + ?Sized> PeriodicTask for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn period(&self) -> Duration {
        (**self).period()
    }

    fn cycle(&mut self) -> Result<Cycle, TaskError> {
        (**self).cycle()
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run a task on the current thread until it finishes, fails, or observes the
/// termination flag.
pub fn run<T: PeriodicTask>(mut task: T, termination: TerminationObserver) -> TaskReport {
    let name = task.name();
    let period = task.period();

    info!("Task {} started (period {:.3} s)", name, period.as_secs_f64());

    let mut timer = PeriodicTimer::new(period);
    let mut num_cycles = 0u64;

    let exit = loop {
        // ---- TERMINATION CHECK ----

        if termination.is_triggered() {
            break ExitReason::Terminated;
        }

        // ---- CYCLE ----

        let outcome = task.cycle();
        num_cycles += 1;

        match outcome {
            Ok(Cycle::Continue) => (),
            Ok(Cycle::Finished) => break ExitReason::Finished,
            Err(e) => {
                error!("Task {} failed and is stopping: {}", name, e);
                break ExitReason::Failed(e.to_string());
            }
        }

        // ---- CYCLE MANAGEMENT ----

        if let Activation::Overrun(d) = timer.wait() {
            warn!("Task {} overran its period by {:.06} s", name, d.as_secs_f64());
        }
    };

    let shutdown_latency_s = match exit {
        ExitReason::Terminated => termination
            .triggered_at()
            .map(|at| Instant::now().saturating_duration_since(at).as_secs_f64()),
        _ => None
    };

    info!("Task {} exited after {} cycles ({:?})", name, num_cycles, exit);

    TaskReport {
        name,
        period_s: period.as_secs_f64(),
        num_cycles,
        num_overruns: timer.num_overruns(),
        exit,
        shutdown_latency_s
    }
}

/// Spawn a task on its own named thread.
pub fn spawn<T>(
    task: T,
    termination: TerminationObserver
) -> std::io::Result<JoinHandle<TaskReport>>
where
    T: PeriodicTask + 'static
{
    thread::Builder::new()
        .name(task.name().to_string())
        .spawn(move || run(task, termination))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::TerminationToken;
    use crate::StepError;

    /// Counts its cycles, optionally finishing or failing after a number of
    /// them.
    struct Counter {
        period: Duration,
        cycles: u64,
        finish_after: Option<u64>,
        fail_after: Option<u64>,
    }

    impl Counter {
        fn new(period_ms: u64) -> Self {
            Self {
                period: Duration::from_millis(period_ms),
                cycles: 0,
                finish_after: None,
                fail_after: None
            }
        }
    }

    impl PeriodicTask for Counter {
        fn name(&self) -> &'static str {
            "counter"
        }

        fn period(&self) -> Duration {
            self.period
        }

        fn cycle(&mut self) -> Result<Cycle, TaskError> {
            self.cycles += 1;

            if Some(self.cycles) == self.fail_after {
                return Err(StepError::NonFinite { step: "counter" }.into());
            }
            if Some(self.cycles) == self.finish_after {
                return Ok(Cycle::Finished);
            }

            Ok(Cycle::Continue)
        }
    }

    #[test]
    fn test_finished_task() {
        let mut task = Counter::new(1);
        task.finish_after = Some(5);

        let report = run(task, TerminationToken::new().observer());

        assert_eq!(report.num_cycles, 5);
        assert_eq!(report.exit, ExitReason::Finished);
        assert!(report.shutdown_latency_s.is_none());
    }

    #[test]
    fn test_failed_task_stops_alone() {
        let token = TerminationToken::new();
        let mut task = Counter::new(1);
        task.fail_after = Some(3);

        let report = run(task, token.observer());

        assert_eq!(report.num_cycles, 3);
        assert!(matches!(report.exit, ExitReason::Failed(_)));

        // A task failure never ends the simulation
        assert!(!token.is_triggered());
    }

    #[test]
    fn test_report_json() {
        let mut task = Counter::new(1);
        task.fail_after = Some(1);

        let json = serde_json::to_value(run(task, TerminationToken::new().observer())).unwrap();

        assert_eq!(json["name"], "counter");
        assert_eq!(json["num_cycles"], 1);
        assert_eq!(
            json["exit"]["Failed"],
            "Processing error: counter produced a non-finite value"
        );
        assert!(json["shutdown_latency_s"].is_null());
    }

    #[test]
    fn test_pre_triggered_token_runs_nothing() {
        let token = TerminationToken::new();
        token.trigger();

        let report = run(Counter::new(10), token.observer());

        assert_eq!(report.num_cycles, 0);
        assert_eq!(report.exit, ExitReason::Terminated);
    }

    #[test]
    fn test_termination_observed_within_one_period() {
        let token = TerminationToken::new();
        let handle = spawn(Box::new(Counter::new(50)), token.observer()).unwrap();

        thread::sleep(Duration::from_millis(220));
        assert!(token.trigger());

        let report = handle.join().unwrap();

        assert_eq!(report.exit, ExitReason::Terminated);
        assert_eq!(report.name, "counter");
        let latency = report.shutdown_latency_s.unwrap();
        // One period plus generous scheduling slack
        assert!(latency <= 0.05 + 0.05, "latency {} s", latency);
        assert!(report.num_cycles >= 4);
    }

    #[test]
    fn test_drift_free_period() {
        // 20 cycles at 10 ms with a 4 ms body must take 200 ms, not 280 ms
        struct Busy(u64);
        impl PeriodicTask for Busy {
            fn name(&self) -> &'static str { "busy" }
            fn period(&self) -> Duration { Duration::from_millis(10) }
            fn cycle(&mut self) -> Result<Cycle, TaskError> {
                thread::sleep(Duration::from_millis(4));
                self.0 += 1;
                if self.0 == 20 { Ok(Cycle::Finished) } else { Ok(Cycle::Continue) }
            }
        }

        let start = Instant::now();
        let report = run(Busy(0), TerminationToken::new().observer());
        let elapsed = start.elapsed();

        assert_eq!(report.num_cycles, 20);
        // 19 waits of one period each, the final cycle finishes without
        // waiting
        assert!(elapsed >= Duration::from_millis(190));
        assert!(elapsed < Duration::from_millis(260), "elapsed {:?}", elapsed);
    }
}
