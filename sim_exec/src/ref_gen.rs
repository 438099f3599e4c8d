//! # Reference generator
//!
//! Produces the raw target trajectory as an explicit function of simulated
//! time, a circle of radius `amplitude_m` travelled at `ang_freq_rads`:
//!
//! ```text
//! xref(t) = A cos(w t)
//! yref(t) = A sin(w t)     for t <  t_flip
//! yref(t) = -A sin(w t)    for t >= t_flip
//! ```
//!
//! The sign flip at `t_flip` is a scripted manoeuvre change which makes the
//! raw reference discontinuous in direction.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::trace;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::f64::consts::PI;
use std::time::Duration;

// Internal
use crate::clock::ClockReader;
use crate::monitors::{MonitorWriter, RefSignal};
use crate::task::{Cycle, PeriodicTask, TaskError};
use util::module::State;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters of the reference generator.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Task period
    ///
    /// Units: seconds
    pub period_s: f64,

    /// Radius of the reference circle
    ///
    /// Units: meters
    pub amplitude_m: f64,

    /// Angular frequency of the reference
    ///
    /// Units: radians/second
    pub ang_freq_rads: f64,

    /// Time at which the Y reference changes sign
    ///
    /// Units: seconds
    pub flip_time_s: f64
}

/// The reference generator step.
#[derive(Debug, Clone)]
pub struct RefGen {
    params: Params
}

/// Periodic task driving [`RefGen`].
pub struct RefGenTask {
    gen: RefGen,
    period: Duration,
    clock: ClockReader,
    reference: MonitorWriter<RefSignal>
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            period_s: 0.12,
            amplitude_m: 5.0 / PI,
            ang_freq_rads: 0.2 * PI,
            flip_time_s: 10.0
        }
    }
}

impl RefGen {
    pub fn new(params: &Params) -> Self {
        Self { params: params.clone() }
    }

    /// Evaluate the reference at simulated time `t_s`.
    pub fn reference_at(&self, t_s: f64) -> RefSignal {
        let a = self.params.amplitude_m;
        let (s, c) = (self.params.ang_freq_rads * t_s).sin_cos();

        let sign = if t_s < self.params.flip_time_s { 1.0 } else { -1.0 };

        RefSignal {
            xref: a * c,
            yref: sign * a * s
        }
    }
}

impl State for RefGen {
    /// Simulated time in seconds
    type InputData = f64;
    type OutputData = RefSignal;
    type ProcError = Infallible;

    fn proc(&mut self, t_s: &f64) -> Result<RefSignal, Infallible> {
        Ok(self.reference_at(*t_s))
    }
}

impl RefGenTask {
    pub fn new(
        params: &Params,
        clock: ClockReader,
        reference: MonitorWriter<RefSignal>
    ) -> Self {
        Self {
            gen: RefGen::new(params),
            period: Duration::from_secs_f64(params.period_s),
            clock,
            reference
        }
    }
}

impl PeriodicTask for RefGenTask {
    fn name(&self) -> &'static str {
        "ref_gen"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn cycle(&mut self) -> Result<Cycle, TaskError> {
        let t = self.clock.time_s();

        let r = match self.gen.proc(&t) {
            Ok(r) => r,
            Err(e) => match e {}
        };

        self.reference.write(r);

        trace!("Reference: t = {:.2} -> xref = {:.4}, yref = {:.4}", t, r.xref, r.yref);

        Ok(Cycle::Continue)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
