//! # Robot control simulator library
//!
//! Real-time, multi-task simulator of a differential-drive robot under
//! model-reference tracking control. Nine periodic tasks (clock, reference
//! generator, two reference models, controller, feedback linearizer, robot
//! dynamics, CSV logger and telemetry interface) exchange data only through
//! lock-protected monitors, each on its own period.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Simulation clock, termination token and the clock task
pub mod clock;

/// CSV data logger - archives a snapshot of the loop on every period
pub mod data_logger;

/// Feedback linearisation - maps lookahead point velocities to robot velocities
pub mod fb_lin;

/// Telemetry interface - prints a status line and applies scheduled gain changes
pub mod interface;

/// Shared state monitors
pub mod monitors;

/// Model-reference tracking controller
pub mod mrac_ctrl;

/// Simulator parameters
pub mod params;

/// Reference trajectory generator
pub mod ref_gen;

/// First order reference models, one per axis
pub mod ref_model;

/// Unicycle kinematics of the robot
pub mod robot_dyn;

/// Task construction, spawning and joining
pub mod sim;

/// Periodic task runner
pub mod task;

// ------------------------------------------------------------------------------------------------
// ERRORS
// ------------------------------------------------------------------------------------------------

/// Errors produced by the computational steps.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("{step} produced a non-finite value")]
    NonFinite {
        step: &'static str
    }
}

/// Check that all values produced by a step are finite.
pub(crate) fn check_finite(step: &'static str, values: &[f64]) -> Result<(), StepError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    }
    else {
        Err(StepError::NonFinite { step })
    }
}
