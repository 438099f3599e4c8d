//! # Simulation assembly
//!
//! Builds the nine periodic tasks around one set of monitors, runs each on its
//! own thread and joins them once the clock has ended the run.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{error, info};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Instant;
use thiserror::Error;

// Internal
use crate::clock::{ClockTask, TerminationToken};
use crate::data_logger::{DataLoggerTask, LoggerReaders};
use crate::fb_lin::FbLinTask;
use crate::interface::InterfaceTask;
use crate::monitors::{self, Readers};
use crate::mrac_ctrl::{CtrlReaders, MracCtrlTask};
use crate::params::{ParamsError, SimParams};
use crate::ref_gen::RefGenTask;
use crate::ref_model::{Axis, RefModelTask};
use crate::robot_dyn::RobotDynTask;
use crate::task::{self, ExitReason, PeriodicTask, TaskReport};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A fully built, not yet started, simulation.
pub struct Simulation {
    tasks: Vec<Box<dyn PeriodicTask>>,
    token: TerminationToken,
    readers: Readers,
    archive_path: PathBuf
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    /// One report per task, in start order
    pub tasks: Vec<TaskReport>,

    /// Wall time between starting the first task and joining the last one
    ///
    /// Units: seconds
    pub elapsed_s: f64
}

// ------------------------------------------------------------------------------------------------
// ENUMERATIONS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SimError {
    #[error("Invalid parameters: {0}")]
    Params(#[from] ParamsError),

    #[error("Could not start the {0} thread: {1}")]
    Spawn(&'static str, std::io::Error),

    #[error("The {0} task panicked")]
    TaskPanicked(&'static str)
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Simulation {
    /// Validate the parameters and build every task. The CSV archive is
    /// written into `archive_dir`.
    pub fn new<P: AsRef<Path>>(params: &SimParams, archive_dir: P) -> Result<Self, SimError> {
        params.validate()?;

        let (w, r) = monitors::create(params);
        let token = w.clock.token();

        let logger = DataLoggerTask::new(
            &params.data_logger,
            archive_dir,
            params.horizon_s,
            LoggerReaders {
                reference: r.reference.clone(),
                robot: r.robot.clone(),
                ctrl_cmd: r.ctrl_cmd.clone(),
                act_cmd: r.act_cmd.clone()
            }
        );
        let archive_path = logger.path().to_path_buf();

        let tasks: Vec<Box<dyn PeriodicTask>> = vec![
            Box::new(ClockTask::new(w.clock, params.clock_period(), params.horizon_s)),
            Box::new(RefGenTask::new(&params.ref_gen, r.clock.clone(), w.reference)),
            Box::new(RefModelTask::new(
                Axis::X,
                &params.ref_model,
                r.reference.clone(),
                r.params.clone(),
                w.ref_model_x
            )),
            Box::new(RefModelTask::new(
                Axis::Y,
                &params.ref_model,
                r.reference.clone(),
                r.params.clone(),
                w.ref_model_y
            )),
            Box::new(MracCtrlTask::new(
                &params.mrac_ctrl,
                CtrlReaders {
                    ref_model_x: r.ref_model_x.clone(),
                    ref_model_y: r.ref_model_y.clone(),
                    robot: r.robot.clone(),
                    params: r.params.clone()
                },
                w.ctrl_cmd
            )),
            Box::new(FbLinTask::new(
                &params.fb_lin,
                params.lookahead_m,
                r.ctrl_cmd.clone(),
                r.robot.clone(),
                w.act_cmd
            )),
            Box::new(RobotDynTask::new(
                &params.robot_dyn,
                params.lookahead_m,
                r.act_cmd.clone(),
                w.robot
            )),
            Box::new(logger),
            Box::new(InterfaceTask::new(
                &params.interface,
                r.clock.clone(),
                r.robot.clone(),
                r.reference.clone(),
                w.params
            ))
        ];

        Ok(Self {
            tasks,
            token,
            readers: r,
            archive_path
        })
    }

    /// Read handles on every monitor, valid after the run as well.
    pub fn readers(&self) -> Readers {
        self.readers.clone()
    }

    /// Path of the CSV archive.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Names of the tasks in start order.
    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Start every task and block until all of them have stopped.
    pub fn run(self) -> Result<SimReport, SimError> {
        let start = Instant::now();
        let mut handles: Vec<(&'static str, JoinHandle<TaskReport>)> = Vec::new();
        let mut spawn_error = None;

        for t in self.tasks {
            let name = t.name();

            match task::spawn(t, self.token.observer()) {
                Ok(h) => handles.push((name, h)),
                Err(e) => {
                    // Stop whatever already started before giving up
                    error!("Could not start task {}: {}", name, e);
                    self.token.trigger();
                    spawn_error = Some(SimError::Spawn(name, e));
                    break;
                }
            }
        }

        info!("{} tasks started", handles.len());

        let mut reports = Vec::with_capacity(handles.len());
        let mut panicked = None;

        for (name, h) in handles {
            match h.join() {
                Ok(r) => reports.push(r),
                Err(_) => {
                    error!("Task {} panicked", name);
                    panicked.get_or_insert(name);
                }
            }
        }

        if let Some(e) = spawn_error {
            return Err(e);
        }
        if let Some(name) = panicked {
            return Err(SimError::TaskPanicked(name));
        }

        Ok(SimReport {
            tasks: reports,
            elapsed_s: start.elapsed().as_secs_f64()
        })
    }
}

impl SimReport {
    /// Tasks which stopped on an error.
    pub fn failed(&self) -> Vec<&TaskReport> {
        self.tasks
            .iter()
            .filter(|r| matches!(r.exit, ExitReason::Failed(_)))
            .collect()
    }

    /// Largest observed delay between termination and a task stopping.
    ///
    /// Units: seconds
    pub fn max_shutdown_latency_s(&self) -> Option<f64> {
        self.tasks
            .iter()
            .filter_map(|r| r.shutdown_latency_s)
            .fold(None, |acc, l| Some(acc.map_or(l, |a: f64| a.max(l))))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nine_tasks() {
        let dir = std::env::temp_dir().join("sim_exec_sim_nine_tasks");
        std::fs::create_dir_all(&dir).unwrap();

        let sim = Simulation::new(&SimParams::default(), &dir).unwrap();

        assert_eq!(
            sim.task_names(),
            vec![
                "clock",
                "ref_gen",
                "ref_model_x",
                "ref_model_y",
                "mrac_ctrl",
                "fb_lin",
                "robot_dyn",
                "data_logger",
                "interface"
            ]
        );
        assert_eq!(sim.archive_path(), dir.join("output.csv").as_path());

        // Parameters start at the configured gains
        assert_eq!(sim.readers().params.read().alpha1, 3.0);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut params = SimParams::default();
        params.clock_period_s = 0.0;

        assert!(matches!(
            Simulation::new(&params, std::env::temp_dir()),
            Err(SimError::Params(ParamsError::NotPositive("clock_period_s", _)))
        ));
    }

    #[test]
    fn test_degenerate_geometry_rejected() {
        let mut params = SimParams::default();
        params.horizon_s = 0.5;
        params.lookahead_m = 1e-18;
        params.fb_lin.u2_max_rads = 1e19;

        assert!(matches!(
            Simulation::new(&params, std::env::temp_dir()),
            Err(SimError::Params(ParamsError::TooSmall("lookahead_m", ..)))
        ));
    }

    #[test]
    fn test_unrepresentable_period_rejected() {
        let mut params = SimParams::default();
        params.robot_dyn.period_s = 1e20;

        // Rejected before any task converts its period to a duration
        assert!(matches!(
            Simulation::new(&params, std::env::temp_dir()),
            Err(SimError::Params(ParamsError::OutOfRange("robot_dyn.period_s", ..)))
        ));
    }
}
