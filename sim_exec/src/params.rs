//! # Simulator Parameters
//!
//! This module provides the startup configuration of the simulator. Every
//! field has a default, so a parameter file only needs to list what it
//! changes:
//!
//! ```toml
//! horizon_s = 30.0
//!
//! [gains]
//! alpha1 = 2.0
//!
//! [[interface.gain_schedule]]
//! at_s = 12.0
//! alpha1 = 4.0
//! alpha2 = 4.0
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Duration;
use thiserror::Error;

use crate::{data_logger, fb_lin, interface, mrac_ctrl, ref_gen, ref_model, robot_dyn};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Shortest accepted task period.
///
/// Units: seconds
pub const MIN_PERIOD_S: f64 = 1e-3;

/// Longest accepted task period.
///
/// Units: seconds
pub const MAX_PERIOD_S: f64 = 3600.0;

/// Smallest accepted lookahead distance. The linearised turn rate scales with
/// `1 / lookahead_m`.
///
/// Units: meters
pub const MIN_LOOKAHEAD_M: f64 = 1e-3;

/// Largest heading change the dynamics may integrate in one period.
///
/// Units: radians
pub const MAX_HEADING_STEP_RAD: f64 = PI;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the whole simulator.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SimParams {

    /// Simulated time after which the run is terminated.
    ///
    /// Units: seconds
    pub horizon_s: f64,

    /// Period of the clock task, which is also the simulated time step.
    ///
    /// Units: seconds
    pub clock_period_s: f64,

    /// Distance from the robot's rotation centre to the controlled lookahead
    /// point.
    ///
    /// Units: meters
    pub lookahead_m: f64,

    /// Initial reference model and controller gains.
    pub gains: Gains,

    pub ref_gen: ref_gen::Params,

    pub ref_model: ref_model::Params,

    pub mrac_ctrl: mrac_ctrl::Params,

    pub fb_lin: fb_lin::Params,

    pub robot_dyn: robot_dyn::Params,

    pub data_logger: data_logger::Params,

    pub interface: interface::Params,
}

/// Gains of the reference models and controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct Gains {
    /// X axis gain
    pub alpha1: f64,

    /// Y axis gain
    pub alpha2: f64
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Invalid parameter values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    #[error("Parameter `{0}` must be strictly positive, found {1}")]
    NotPositive(&'static str, f64),

    #[error("Parameter `{0}` must be between {2} and {3}, found {1}")]
    OutOfRange(&'static str, f64, f64, f64),

    #[error("Parameter `{0}` must be at least {2}, found {1}")]
    TooSmall(&'static str, f64, f64),

    #[error(
        "fb_lin.u2_max_rads * robot_dyn.period_s turns the robot by {0} rad in one period, \
        more than {1} rad"
    )]
    HeadingStepTooLarge(f64, f64),

    #[error("Gain schedule entry {0} has an invalid time {1} s")]
    InvalidScheduleTime(usize, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            horizon_s: 20.0,
            clock_period_s: 0.1,
            lookahead_m: 0.3,
            gains: Gains::default(),
            ref_gen: ref_gen::Params::default(),
            ref_model: ref_model::Params::default(),
            mrac_ctrl: mrac_ctrl::Params::default(),
            fb_lin: fb_lin::Params::default(),
            robot_dyn: robot_dyn::Params::default(),
            data_logger: data_logger::Params::default(),
            interface: interface::Params::default(),
        }
    }
}

impl Default for Gains {
    fn default() -> Self {
        Self {
            alpha1: 3.0,
            alpha2: 3.0
        }
    }
}

impl SimParams {
    /// Check every value, returning the first invalid one.
    ///
    /// Periods must lie in `[MIN_PERIOD_S, MAX_PERIOD_S]` so that every task
    /// has a representable, non-zero period.
    pub fn validate(&self) -> Result<(), ParamsError> {
        positive("horizon_s", self.horizon_s)?;
        period("clock_period_s", self.clock_period_s)?;
        at_least("lookahead_m", self.lookahead_m, MIN_LOOKAHEAD_M)?;
        positive("gains.alpha1", self.gains.alpha1)?;
        positive("gains.alpha2", self.gains.alpha2)?;

        period("ref_gen.period_s", self.ref_gen.period_s)?;
        positive("ref_gen.ang_freq_rads", self.ref_gen.ang_freq_rads)?;

        period("ref_model.period_s", self.ref_model.period_s)?;

        period("mrac_ctrl.period_s", self.mrac_ctrl.period_s)?;
        positive("mrac_ctrl.v1_max", self.mrac_ctrl.v1_max)?;
        positive("mrac_ctrl.v2_max", self.mrac_ctrl.v2_max)?;

        period("fb_lin.period_s", self.fb_lin.period_s)?;
        positive("fb_lin.u1_max_ms", self.fb_lin.u1_max_ms)?;
        positive("fb_lin.u2_max_rads", self.fb_lin.u2_max_rads)?;

        period("robot_dyn.period_s", self.robot_dyn.period_s)?;

        let heading_step = self.fb_lin.u2_max_rads * self.robot_dyn.period_s;
        if heading_step > MAX_HEADING_STEP_RAD {
            return Err(ParamsError::HeadingStepTooLarge(heading_step, MAX_HEADING_STEP_RAD));
        }

        period("data_logger.period_s", self.data_logger.period_s)?;

        period("interface.period_s", self.interface.period_s)?;
        for (i, step) in self.interface.gain_schedule.iter().enumerate() {
            if !(step.at_s >= 0.0) || !step.at_s.is_finite() {
                return Err(ParamsError::InvalidScheduleTime(i, step.at_s));
            }
            positive("interface.gain_schedule.alpha1", step.alpha1)?;
            positive("interface.gain_schedule.alpha2", step.alpha2)?;
        }

        Ok(())
    }

    /// Clock tick as a duration.
    pub fn clock_period(&self) -> Duration {
        Duration::from_secs_f64(self.clock_period_s)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn positive(name: &'static str, value: f64) -> Result<(), ParamsError> {
    // Also rejects NaN and infinity
    if value > 0.0 && value.is_finite() {
        Ok(())
    }
    else {
        Err(ParamsError::NotPositive(name, value))
    }
}

fn at_least(name: &'static str, value: f64, min: f64) -> Result<(), ParamsError> {
    positive(name, value)?;

    if value >= min {
        Ok(())
    }
    else {
        Err(ParamsError::TooSmall(name, value, min))
    }
}

fn period(name: &'static str, value: f64) -> Result<(), ParamsError> {
    positive(name, value)?;

    if (MIN_PERIOD_S..=MAX_PERIOD_S).contains(&value) {
        Ok(())
    }
    else {
        Err(ParamsError::OutOfRange(name, value, MIN_PERIOD_S, MAX_PERIOD_S))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
