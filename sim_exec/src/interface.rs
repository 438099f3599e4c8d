//! # Telemetry interface
//!
//! Prints a one line snapshot of the loop on stdout every period:
//!
//! ```text
//! [12.00s] x=(0.41, 1.52, 2.01) | y=(0.28, 1.79) | ref=(-1.27, 1.25) | α=(3.00, 3.00)
//! ```
//!
//! The interface is also the owner of the control parameters. It applies the
//! configured gain schedule, a list of `(at_s, alpha1, alpha2)` steps, as
//! simulated time passes each step. With an empty schedule the gains never
//! change from their initial values.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Internal
use crate::clock::ClockReader;
use crate::monitors::{ControlParams, MonitorReader, MonitorWriter, RefSignal, RobotState};
use crate::task::{Cycle, PeriodicTask, TaskError};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters of the interface.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Task period
    ///
    /// Units: seconds
    pub period_s: f64,

    /// Gain changes to apply during the run, in any order
    pub gain_schedule: Vec<GainStep>
}

/// A scheduled change of the control gains.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GainStep {
    /// Simulated time from which the gains apply
    ///
    /// Units: seconds
    pub at_s: f64,

    pub alpha1: f64,
    pub alpha2: f64
}

/// Time ordered gain schedule.
#[derive(Debug, Clone, Default)]
pub struct GainSchedule {
    steps: Vec<GainStep>,

    /// Index of the first step not yet applied
    next: usize
}

/// The interface task.
pub struct InterfaceTask {
    period: Duration,
    schedule: GainSchedule,

    clock: ClockReader,
    robot: MonitorReader<RobotState>,
    reference: MonitorReader<RefSignal>,
    params: MonitorWriter<ControlParams>
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            period_s: 1.0,
            gain_schedule: Vec::new()
        }
    }
}

impl GainSchedule {
    /// Build the schedule, sorting the steps by time. Steps with the same time
    /// keep their configured order.
    pub fn new(steps: &[GainStep]) -> Self {
        let mut steps = steps.to_vec();
        steps.sort_by(|a, b| a.at_s.partial_cmp(&b.at_s).unwrap_or(std::cmp::Ordering::Equal));

        Self { steps, next: 0 }
    }

    /// Consume every step due at `t_s`, returning the gains of the latest one.
    pub fn due(&mut self, t_s: f64) -> Option<ControlParams> {
        let mut gains = None;

        while let Some(step) = self.steps.get(self.next) {
            if step.at_s > t_s {
                break;
            }

            gains = Some(ControlParams {
                alpha1: step.alpha1,
                alpha2: step.alpha2
            });
            self.next += 1;
        }

        gains
    }

    /// Number of steps not yet applied.
    pub fn num_pending(&self) -> usize {
        self.steps.len() - self.next
    }
}

impl InterfaceTask {
    pub fn new(
        params: &Params,
        clock: ClockReader,
        robot: MonitorReader<RobotState>,
        reference: MonitorReader<RefSignal>,
        ctrl_params: MonitorWriter<ControlParams>
    ) -> Self {
        Self {
            period: Duration::from_secs_f64(params.period_s),
            schedule: GainSchedule::new(&params.gain_schedule),
            clock,
            robot,
            reference,
            params: ctrl_params
        }
    }
}

impl PeriodicTask for InterfaceTask {
    fn name(&self) -> &'static str {
        "interface"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn cycle(&mut self) -> Result<Cycle, TaskError> {
        let t = self.clock.time_s();

        if let Some(gains) = self.schedule.due(t) {
            self.params.write(gains);
            info!(
                "Gains retuned at t = {:.2} s: alpha1 = {}, alpha2 = {} ({} changes pending)",
                t, gains.alpha1, gains.alpha2, self.schedule.num_pending()
            );
        }

        let robot = self.robot.read();
        let reference = self.reference.read();
        let gains = self.params.read();

        let line = format_telemetry(t, &robot, &reference, &gains);
        println!("{}", line);
        debug!("{}", line);

        Ok(Cycle::Continue)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Format the telemetry line, every value to 2 decimals.
pub fn format_telemetry(
    t_s: f64,
    robot: &RobotState,
    reference: &RefSignal,
    gains: &ControlParams
) -> String {
    format!(
        "[{:.2}s] x=({:.2}, {:.2}, {:.2}) | y=({:.2}, {:.2}) | ref=({:.2}, {:.2}) | α=({:.2}, {:.2})",
        t_s,
        robot.x1, robot.x2, robot.x3,
        robot.y1, robot.y2,
        reference.xref, reference.yref,
        gains.alpha1, gains.alpha2
    )
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
