//! # Feedback linearisation
//!
//! Maps the velocity demanded of the lookahead point, a distance `R` ahead of
//! the robot's rotation centre, onto the robot's own linear and angular
//! velocities:
//!
//! ```text
//! | u1 |   |  cos(x3)     sin(x3)   | | v1 |
//! | u2 | = | -sin(x3)/R   cos(x3)/R | | v2 |
//! ```
//!
//! Both outputs are then saturated to the actuator limits.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Internal
use crate::monitors::{ActuationCmd, ControlCmd, MonitorReader, MonitorWriter, RobotState};
use crate::task::{Cycle, PeriodicTask, TaskError};
use crate::{check_finite, StepError};
use util::maths::saturate;
use util::module::State;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters of the linearizer.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Task period
    ///
    /// Units: seconds
    pub period_s: f64,

    /// Maximum linear velocity magnitude
    ///
    /// Units: meters/second
    pub u1_max_ms: f64,

    /// Maximum angular velocity magnitude
    ///
    /// Units: radians/second
    pub u2_max_rads: f64
}

/// Input to the linearizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FbLinInput {
    /// Robot heading
    ///
    /// Units: radians
    pub heading_rad: f64,

    pub cmd: ControlCmd
}

/// The feedback linearizer.
#[derive(Debug, Clone)]
pub struct FbLin {
    lookahead_m: f64,
    u1_max_ms: f64,
    u2_max_rads: f64
}

/// Periodic task driving [`FbLin`].
pub struct FbLinTask {
    lin: FbLin,
    period: Duration,

    cmd: MonitorReader<ControlCmd>,
    robot: MonitorReader<RobotState>,
    act: MonitorWriter<ActuationCmd>
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            period_s: 0.03,
            u1_max_ms: 1.0,
            u2_max_rads: 3.0
        }
    }
}

impl FbLin {
    /// Create a new linearizer for a lookahead point `lookahead_m` ahead of
    /// the rotation centre.
    pub fn new(params: &Params, lookahead_m: f64) -> Self {
        Self {
            lookahead_m,
            u1_max_ms: params.u1_max_ms,
            u2_max_rads: params.u2_max_rads
        }
    }

    /// The decoupling matrix at the given heading.
    pub fn decoupling_matrix(&self, heading_rad: f64) -> Matrix2<f64> {
        let (s, c) = heading_rad.sin_cos();
        let r = self.lookahead_m;

        Matrix2::new(
             c,     s,
            -s / r, c / r
        )
    }
}

impl State for FbLin {
    type InputData = FbLinInput;
    type OutputData = ActuationCmd;
    type ProcError = StepError;

    fn proc(&mut self, input: &FbLinInput) -> Result<ActuationCmd, StepError> {
        let v = Vector2::new(input.cmd.v1, input.cmd.v2);
        let u = self.decoupling_matrix(input.heading_rad) * v;

        check_finite("fb_lin", u.as_slice())?;

        Ok(ActuationCmd {
            u1: saturate(u[0], self.u1_max_ms),
            u2: saturate(u[1], self.u2_max_rads)
        })
    }
}

impl FbLinTask {
    pub fn new(
        params: &Params,
        lookahead_m: f64,
        cmd: MonitorReader<ControlCmd>,
        robot: MonitorReader<RobotState>,
        act: MonitorWriter<ActuationCmd>
    ) -> Self {
        Self {
            lin: FbLin::new(params, lookahead_m),
            period: Duration::from_secs_f64(params.period_s),
            cmd,
            robot,
            act
        }
    }
}

impl PeriodicTask for FbLinTask {
    fn name(&self) -> &'static str {
        "fb_lin"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn cycle(&mut self) -> Result<Cycle, TaskError> {
        let input = FbLinInput {
            cmd: self.cmd.read(),
            heading_rad: self.robot.read().x3
        };

        let act = self.lin.proc(&input)?;
        self.act.write(act);

        trace!("Actuation: u = ({:.4}, {:.4})", act.u1, act.u2);

        Ok(Cycle::Continue)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
