//! # Reference models
//!
//! Each axis has its own first order reference model which turns the raw,
//! possibly discontinuous, reference into a smooth target with a known
//! derivative:
//!
//! ```text
//! dy_m = alpha * (ref - y_m)
//! y_m  = y_m + dy_m * dt
//! ```
//!
//! `alpha` is read from the control parameters on every cycle, so a gain
//! change takes effect on the next activation.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// Internal
use crate::monitors::{ControlParams, MonitorReader, MonitorWriter, RefModelState, RefSignal};
use crate::task::{Cycle, PeriodicTask, TaskError};
use crate::{check_finite, StepError};
use util::module::State;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters of the reference models, shared by both axes.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Task period, also used as the integration step
    ///
    /// Units: seconds
    pub period_s: f64
}

/// Input to one step of a reference model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefModelInput {
    /// Raw reference for this axis
    pub reference: f64,

    /// Model state before the step
    pub y_m: f64,

    /// Model gain
    pub alpha: f64
}

/// Forward Euler discretisation of a first order model.
#[derive(Debug, Clone)]
pub struct RefModel {
    dt_s: f64
}

/// Periodic task driving a [`RefModel`] for a single axis.
pub struct RefModelTask {
    axis: Axis,
    model: RefModel,
    period: Duration,

    reference: MonitorReader<RefSignal>,
    params: MonitorReader<ControlParams>,
    state: MonitorWriter<RefModelState>
}

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

/// Axis a reference model filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Uses `xref` and `alpha1`
    X,

    /// Uses `yref` and `alpha2`
    Y
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            period_s: 0.05
        }
    }
}

impl Axis {
    /// The raw reference for this axis.
    pub fn reference(&self, r: &RefSignal) -> f64 {
        match self {
            Axis::X => r.xref,
            Axis::Y => r.yref
        }
    }

    /// The model gain for this axis.
    pub fn alpha(&self, p: &ControlParams) -> f64 {
        match self {
            Axis::X => p.alpha1,
            Axis::Y => p.alpha2
        }
    }
}

impl RefModel {
    pub fn new(dt_s: f64) -> Self {
        Self { dt_s }
    }
}

impl State for RefModel {
    type InputData = RefModelInput;
    type OutputData = RefModelState;
    type ProcError = StepError;

    fn proc(&mut self, input: &RefModelInput) -> Result<RefModelState, StepError> {
        let dy_m = input.alpha * (input.reference - input.y_m);
        let y_m = input.y_m + dy_m * self.dt_s;

        check_finite("ref_model", &[y_m, dy_m])?;

        Ok(RefModelState { y_m, dy_m })
    }
}

impl RefModelTask {
    pub fn new(
        axis: Axis,
        params: &Params,
        reference: MonitorReader<RefSignal>,
        ctrl_params: MonitorReader<ControlParams>,
        state: MonitorWriter<RefModelState>
    ) -> Self {
        Self {
            axis,
            model: RefModel::new(params.period_s),
            period: Duration::from_secs_f64(params.period_s),
            reference,
            params: ctrl_params,
            state
        }
    }
}

impl PeriodicTask for RefModelTask {
    fn name(&self) -> &'static str {
        match self.axis {
            Axis::X => "ref_model_x",
            Axis::Y => "ref_model_y"
        }
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn cycle(&mut self) -> Result<Cycle, TaskError> {
        let input = RefModelInput {
            reference: self.axis.reference(&self.reference.read()),
            y_m: self.state.read().y_m,
            alpha: self.axis.alpha(&self.params.read())
        };

        let out = self.model.proc(&input)?;
        self.state.write(out);

        trace!("{:?} ref model: y_m = {:.4}, dy_m = {:.4}", self.axis, out.y_m, out.dy_m);

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

    #[test]
    fn test_step_response() {
        let mut model = RefModel::new(0.05);
        let alpha = 3.0f64;

        let mut y_m = 0.0;
        let mut settled_at = None;

        for k in 1..=100 {
            let out = model.proc(&RefModelInput { reference: 5.0, y_m, alpha }).unwrap();
            y_m = out.y_m;

            // Discrete solution of the Euler scheme
            let exact = 5.0 * (1.0 - (1.0f64 - alpha * 0.05).powi(k));
            assert!((y_m - exact).abs() < 1e-9, "k = {}", k);

            // Never far from the continuous time response either
            let continuous = 5.0 * (1.0 - (-alpha * 0.05 * k as f64).exp());
            assert!((y_m - continuous).abs() < 0.15, "k = {}", k);

            // Monotonic approach, no overshoot
            assert!(y_m <= 5.0);

            if settled_at.is_none() && (5.0 - y_m) <= 0.05 {
                settled_at = Some(k);
            }
        }

        // Within 1 % after 29 steps, i.e. 1.45 s against 1.54 s for the
        // continuous model
        assert_eq!(settled_at, Some(29));
    }

    #[test]
    fn test_derivative_published() {
        let mut model = RefModel::new(0.05);
        let out = model.proc(&RefModelInput { reference: 2.0, y_m: 1.0, alpha: 3.0 }).unwrap();

        assert_eq!(out.dy_m, 3.0);
        assert!((out.y_m - 1.15).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut model = RefModel::new(0.05);
        let res = model.proc(&RefModelInput { reference: std::f64::NAN, y_m: 0.0, alpha: 3.0 });

        assert_eq!(res, Err(StepError::NonFinite { step: "ref_model" }));
    }

    #[test]
    fn test_task_reads_its_axis() {
        let (ref_w, ref_r) = monitor(RefSignal { xref: 1.0, yref: -2.0 });
        let (_params_w, params_r) = monitor(ControlParams { alpha1: 2.0, alpha2: 4.0 });
        let (x_w, x_r) = monitor(RefModelState::default());
        let (y_w, y_r) = monitor(RefModelState::default());

        let params = Params { period_s: 0.1 };
        let mut x = RefModelTask::new(Axis::X, &params, ref_r.clone(), params_r.clone(), x_w);
        let mut y = RefModelTask::new(Axis::Y, &params, ref_r, params_r, y_w);

        assert_eq!(x.name(), "ref_model_x");
        assert_eq!(y.name(), "ref_model_y");

        x.cycle().unwrap();
        y.cycle().unwrap();

        assert_eq!(x_r.read().dy_m, 2.0);
        assert_eq!(y_r.read().dy_m, -8.0);

        // The second cycle starts from the published state
        ref_w.write(RefSignal::default());
        x.cycle().unwrap();
        let prev = 0.2;
        assert!((x_r.read().dy_m - 2.0 * (0.0 - prev)).abs() < 1e-12);
    }
}
