//! # Model reference tracking controller
//!
//! Drives the robot's lookahead point onto the reference model outputs with a
//! feedforward of the model derivative and a proportional correction:
//!
//! ```text
//! v1 = sat(dy_m1 + alpha1 * (y_m1 - y1), v1_max)
//! v2 = sat(dy_m2 + alpha2 * (y_m2 - y2), v2_max)
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Internal
use crate::monitors::{
    ControlCmd, ControlParams, MonitorReader, MonitorWriter, RefModelState, RobotState
};
use crate::task::{Cycle, PeriodicTask, TaskError};
use crate::{check_finite, StepError};
use util::maths::saturate;
use util::module::State;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters of the controller.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Task period
    ///
    /// Units: seconds
    pub period_s: f64,

    /// Maximum magnitude of the X velocity command
    ///
    /// Units: meters/second
    pub v1_max: f64,

    /// Maximum magnitude of the Y velocity command
    ///
    /// Units: meters/second
    pub v2_max: f64
}

/// Input to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CtrlInput {
    pub ref_model_x: RefModelState,
    pub ref_model_y: RefModelState,

    /// Measured lookahead point position, `(y1, y2)`
    pub output: (f64, f64),

    pub gains: ControlParams
}

/// The controller.
#[derive(Debug, Clone)]
pub struct MracCtrl {
    v1_max: f64,
    v2_max: f64
}

/// Periodic task driving [`MracCtrl`].
pub struct MracCtrlTask {
    ctrl: MracCtrl,
    period: Duration,

    ref_model_x: MonitorReader<RefModelState>,
    ref_model_y: MonitorReader<RefModelState>,
    robot: MonitorReader<RobotState>,
    params: MonitorReader<ControlParams>,
    cmd: MonitorWriter<ControlCmd>
}

/// The monitors read by [`MracCtrlTask`].
pub struct CtrlReaders {
    pub ref_model_x: MonitorReader<RefModelState>,
    pub ref_model_y: MonitorReader<RefModelState>,
    pub robot: MonitorReader<RobotState>,
    pub params: MonitorReader<ControlParams>
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            period_s: 0.05,
            v1_max: 1.0,
            v2_max: 1.0
        }
    }
}

impl MracCtrl {
    pub fn new(params: &Params) -> Self {
        Self {
            v1_max: params.v1_max,
            v2_max: params.v2_max
        }
    }
}

impl State for MracCtrl {
    type InputData = CtrlInput;
    type OutputData = ControlCmd;
    type ProcError = StepError;

    fn proc(&mut self, input: &CtrlInput) -> Result<ControlCmd, StepError> {
        let (y1, y2) = input.output;
        let (mx, my) = (input.ref_model_x, input.ref_model_y);

        let v1 = mx.dy_m + input.gains.alpha1 * (mx.y_m - y1);
        let v2 = my.dy_m + input.gains.alpha2 * (my.y_m - y2);

        // Saturating NaN would hide it, check before
        check_finite("mrac_ctrl", &[v1, v2])?;

        Ok(ControlCmd {
            v1: saturate(v1, self.v1_max),
            v2: saturate(v2, self.v2_max)
        })
    }
}

impl MracCtrlTask {
    pub fn new(params: &Params, readers: CtrlReaders, cmd: MonitorWriter<ControlCmd>) -> Self {
        Self {
            ctrl: MracCtrl::new(params),
            period: Duration::from_secs_f64(params.period_s),
            ref_model_x: readers.ref_model_x,
            ref_model_y: readers.ref_model_y,
            robot: readers.robot,
            params: readers.params,
            cmd
        }
    }
}

impl PeriodicTask for MracCtrlTask {
    fn name(&self) -> &'static str {
        "mrac_ctrl"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn cycle(&mut self) -> Result<Cycle, TaskError> {
        let robot = self.robot.read();

        let input = CtrlInput {
            ref_model_x: self.ref_model_x.read(),
            ref_model_y: self.ref_model_y.read(),
            output: (robot.y1, robot.y2),
            gains: self.params.read()
        };

        let cmd = self.ctrl.proc(&input)?;
        self.cmd.write(cmd);

        trace!("Control command: v = ({:.4}, {:.4})", cmd.v1, cmd.v2);

        Ok(Cycle::Continue)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::monitors::monitor;

    fn input(y_m: (f64, f64), dy_m: (f64, f64), output: (f64, f64)) -> CtrlInput {
        CtrlInput {
            ref_model_x: RefModelState { y_m: y_m.0, dy_m: dy_m.0 },
            ref_model_y: RefModelState { y_m: y_m.1, dy_m: dy_m.1 },
            output,
            gains: ControlParams { alpha1: 3.0, alpha2: 3.0 }
        }
    }

    #[test]
    fn test_unsaturated_law() {
        let mut ctrl = MracCtrl::new(&Params::default());

        let cmd = ctrl.proc(&input((0.5, 0.2), (0.1, -0.2), (0.4, 0.3))).unwrap();

        assert!((cmd.v1 - (0.1 + 3.0 * 0.1)).abs() < 1e-12);
        assert!((cmd.v2 - (-0.2 + 3.0 * -0.1)).abs() < 1e-12);
    }

    #[test]
    fn test_saturation() {
        let mut ctrl = MracCtrl::new(&Params::default());

        let cmd = ctrl.proc(&input((10.0, -10.0), (0.0, 0.0), (0.0, 0.0))).unwrap();
        assert_eq!(cmd, ControlCmd { v1: 1.0, v2: -1.0 });

        let mut ctrl = MracCtrl::new(&Params { v2_max: 0.5, ..Params::default() });
        let cmd = ctrl.proc(&input((0.0, 0.0), (-3.0, 3.0), (0.0, 0.0))).unwrap();
        assert_eq!(cmd, ControlCmd { v1: -1.0, v2: 0.5 });
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut ctrl = MracCtrl::new(&Params::default());

        let res = ctrl.proc(&input((std::f64::INFINITY, 0.0), (0.0, 0.0), (0.0, 0.0)));
        assert_eq!(res, Err(StepError::NonFinite { step: "mrac_ctrl" }));
    }

    #[test]
    fn test_task_uses_live_gains() {
        let (_x_w, x_r) = monitor(RefModelState { y_m: 0.1, dy_m: 0.0 });
        let (_y_w, y_r) = monitor(RefModelState::default());
        let (_robot_w, robot_r) = monitor(RobotState::default());
        let (params_w, params_r) = monitor(ControlParams { alpha1: 3.0, alpha2: 3.0 });
        let (cmd_w, cmd_r) = monitor(ControlCmd::default());

        let mut task = MracCtrlTask::new(
            &Params::default(),
            CtrlReaders {
                ref_model_x: x_r,
                ref_model_y: y_r,
                robot: robot_r,
                params: params_r
            },
            cmd_w
        );

        task.cycle().unwrap();
        assert!((cmd_r.read().v1 - 0.3).abs() < 1e-12);

        params_w.write(ControlParams { alpha1: 5.0, alpha2: 3.0 });
        task.cycle().unwrap();
        assert!((cmd_r.read().v1 - 0.5).abs() < 1e-12);
    }
}
