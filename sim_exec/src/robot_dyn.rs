//! # Robot dynamics
//!
//! Unicycle kinematics of the differential-drive robot, integrated with a
//! forward Euler step of one task period:
//!
//! ```text
//! x1' = cos(x3) u1
//! x2' = sin(x3) u1
//! x3' = u2
//! ```
//!
//! The measured output is the lookahead point `y = (x1, x2) + R (cos x3, sin x3)`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Internal
use crate::monitors::{ActuationCmd, MonitorReader, MonitorWriter, RobotState};
use crate::task::{Cycle, PeriodicTask, TaskError};
use crate::{check_finite, StepError};
use util::maths::wrap_pi;
use util::module::State;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters of the robot model.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Task period, also used as the integration step
    ///
    /// Units: seconds
    pub period_s: f64
}

/// Input to one integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynInput {
    pub state: RobotState,
    pub act: ActuationCmd
}

/// The robot model.
#[derive(Debug, Clone)]
pub struct RobotDyn {
    dt_s: f64,
    lookahead_m: f64
}

/// Periodic task driving [`RobotDyn`].
pub struct RobotDynTask {
    model: RobotDyn,
    period: Duration,

    act: MonitorReader<ActuationCmd>,
    robot: MonitorWriter<RobotState>
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            period_s: 0.03
        }
    }
}

impl RobotDyn {
    pub fn new(params: &Params, lookahead_m: f64) -> Self {
        Self {
            dt_s: params.period_s,
            lookahead_m
        }
    }

    /// Lookahead point of a robot at `(x1, x2)` with heading `x3`.
    pub fn output(&self, pose: &Vector3<f64>) -> Vector2<f64> {
        let (s, c) = pose[2].sin_cos();
        Vector2::new(pose[0], pose[1]) + self.lookahead_m * Vector2::new(c, s)
    }
}

impl State for RobotDyn {
    type InputData = DynInput;
    type OutputData = RobotState;
    type ProcError = StepError;

    fn proc(&mut self, input: &DynInput) -> Result<RobotState, StepError> {
        let x = Vector3::new(input.state.x1, input.state.x2, input.state.x3);
        let (s, c) = x[2].sin_cos();

        let dx = Vector3::new(c * input.act.u1, s * input.act.u1, input.act.u2);

        let mut next = x + dx * self.dt_s;
        next[2] = wrap_pi(next[2]);

        let y = self.output(&next);

        check_finite("robot_dyn", &[next[0], next[1], next[2], y[0], y[1]])?;

        Ok(RobotState {
            x1: next[0],
            x2: next[1],
            x3: next[2],
            y1: y[0],
            y2: y[1]
        })
    }
}

impl RobotDynTask {
    pub fn new(
        params: &Params,
        lookahead_m: f64,
        act: MonitorReader<ActuationCmd>,
        robot: MonitorWriter<RobotState>
    ) -> Self {
        Self {
            model: RobotDyn::new(params, lookahead_m),
            period: Duration::from_secs_f64(params.period_s),
            act,
            robot
        }
    }
}

impl PeriodicTask for RobotDynTask {
    fn name(&self) -> &'static str {
        "robot_dyn"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn cycle(&mut self) -> Result<Cycle, TaskError> {
        let input = DynInput {
            act: self.act.read(),
            state: self.robot.read()
        };

        let state = self.model.proc(&input)?;

        // Pose and output are published together
        self.robot.write(state);

        trace!(
            "Robot: x = ({:.4}, {:.4}, {:.4}), y = ({:.4}, {:.4})",
            state.x1, state.x2, state.x3, state.y1, state.y2
        );

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
    use std::f64::consts::PI;

    fn step(model: &mut RobotDyn, state: RobotState, u1: f64, u2: f64) -> RobotState {
        model.proc(&DynInput { state, act: ActuationCmd { u1, u2 } }).unwrap()
    }

    #[test]
    fn test_straight_line() {
        let mut model = RobotDyn::new(&Params { period_s: 0.1 }, 0.3);

        let s = step(&mut model, RobotState::default(), 1.0, 0.0);

        assert!((s.x1 - 0.1).abs() < 1e-12);
        assert_eq!(s.x2, 0.0);
        assert_eq!(s.x3, 0.0);
        assert!((s.y1 - 0.4).abs() < 1e-12);
        assert_eq!(s.y2, 0.0);
    }

    #[test]
    fn test_heading_stays_in_range() {
        let mut model = RobotDyn::new(&Params::default(), 0.3);
        let mut s = RobotState::default();

        // Spin at full rate in both directions for a few turns
        for &u2 in &[3.0, -3.0] {
            for _ in 0..500 {
                let prev = s.x3;
                s = step(&mut model, s, 0.5, u2);

                assert!(s.x3 > -PI && s.x3 <= PI, "x3 = {}", s.x3);

                // Away from the wrap the heading moves by exactly u2 dt
                let d = s.x3 - prev;
                assert!(
                    (d - u2 * 0.03).abs() < 1e-9 || (d.abs() - (2.0 * PI - 0.09)).abs() < 1e-9,
                    "d = {}", d
                );
            }
        }
    }

    #[test]
    fn test_wrap_at_pi() {
        let mut model = RobotDyn::new(&Params { period_s: 1.0 }, 0.3);

        let s = step(&mut model, RobotState { x3: 3.0, ..RobotState::default() }, 0.0, 0.5);
        assert!((s.x3 - (3.5 - 2.0 * PI)).abs() < 1e-12);

        let s = step(&mut model, RobotState { x3: -3.0, ..RobotState::default() }, 0.0, -0.5);
        assert!((s.x3 - (2.0 * PI - 3.5)).abs() < 1e-12);
    }

    #[test]
    fn test_huge_turn_rate_wraps() {
        let mut model = RobotDyn::new(&Params::default(), 1e-18);

        // Heading jumps far past the range where one turn is below the
        // float resolution
        let s = step(&mut model, RobotState::default(), 1.0, 1e19);

        assert!(s.x3 > -PI && s.x3 <= PI, "x3 = {}", s.x3);
        assert!(s.y1.is_finite() && s.y2.is_finite());
    }

    #[test]
    fn test_output_is_lookahead_point() {
        let mut model = RobotDyn::new(&Params::default(), 0.3);
        let mut s = RobotState { x1: 1.0, x2: -2.0, x3: 0.4, ..RobotState::default() };

        for _ in 0..50 {
            s = step(&mut model, s, 0.7, 1.3);

            let (sin, cos) = s.x3.sin_cos();
            assert!((s.y1 - (s.x1 + 0.3 * cos)).abs() < 1e-12);
            assert!((s.y2 - (s.x2 + 0.3 * sin)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut model = RobotDyn::new(&Params::default(), 0.3);
        let res = model.proc(&DynInput {
            state: RobotState::default(),
            act: ActuationCmd { u1: std::f64::NAN, u2: 0.0 }
        });

        assert_eq!(res, Err(StepError::NonFinite { step: "robot_dyn" }));
    }

    #[test]
    fn test_task_integrates_from_published_state() {
        let (_act_w, act_r) = monitor(ActuationCmd { u1: 1.0, u2: 0.0 });
        let (robot_w, robot_r) = monitor(RobotState::default());
        let mut task = RobotDynTask::new(&Params { period_s: 0.1 }, 0.3, act_r, robot_w);

        for _ in 0..10 {
            task.cycle().unwrap();
        }

        assert!((robot_r.read().x1 - 1.0).abs() < 1e-9);
        assert!((robot_r.read().y1 - 1.3).abs() < 1e-9);
    }
}
