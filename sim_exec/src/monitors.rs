//! # Shared state monitors
//!
//! Every piece of state shared between tasks lives in a monitor: a plain-data
//! payload behind its own lock. A monitor is created as a pair of handles:
//!
//! - a [`MonitorWriter`], which is unique (it cannot be cloned) and is moved
//!   into the single task allowed to produce the payload,
//! - any number of [`MonitorReader`]s, handed to the consuming tasks.
//!
//! Access is copy-in/copy-out only. Each call locks, copies the whole payload
//! and unlocks before returning, so a task can never hold two monitor locks at
//! once and there is no lock ordering to get wrong. The price is that a task
//! reading several monitors gets a non-atomic snapshot across them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// Internal
use crate::clock::{self, ClockReader, ClockWriter};
use crate::params::SimParams;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Unique write handle to a monitor.
#[derive(Debug)]
pub struct MonitorWriter<T> {
    cell: Arc<Mutex<T>>
}

/// Shared read handle to a monitor.
#[derive(Debug)]
pub struct MonitorReader<T> {
    cell: Arc<Mutex<T>>
}

/// Robot pose and measured output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct RobotState {
    /// Position along the X axis
    ///
    /// Units: meters
    pub x1: f64,

    /// Position along the Y axis
    ///
    /// Units: meters
    pub x2: f64,

    /// Heading, in (-pi, pi]
    ///
    /// Units: radians
    pub x3: f64,

    /// Lookahead point X position
    ///
    /// Units: meters
    pub y1: f64,

    /// Lookahead point Y position
    ///
    /// Units: meters
    pub y2: f64
}

/// Operator tunable gains of the reference models and controller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct ControlParams {
    pub alpha1: f64,
    pub alpha2: f64
}

/// Raw reference trajectory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct RefSignal {
    pub xref: f64,
    pub yref: f64
}

/// Filtered reference and its derivative for one axis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct RefModelState {
    pub y_m: f64,
    pub dy_m: f64
}

/// Saturated velocity command of the lookahead point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct ControlCmd {
    pub v1: f64,
    pub v2: f64
}

/// Saturated linear and angular velocity demands of the robot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct ActuationCmd {
    /// Units: meters/second
    pub u1: f64,

    /// Units: radians/second
    pub u2: f64
}

/// The write handles of every monitor in the simulator.
///
/// This is destructured when the tasks are built so that each writer ends up
/// in exactly one task.
#[derive(Debug)]
pub struct Writers {
    pub clock: ClockWriter,
    pub robot: MonitorWriter<RobotState>,
    pub params: MonitorWriter<ControlParams>,
    pub reference: MonitorWriter<RefSignal>,
    pub ref_model_x: MonitorWriter<RefModelState>,
    pub ref_model_y: MonitorWriter<RefModelState>,
    pub ctrl_cmd: MonitorWriter<ControlCmd>,
    pub act_cmd: MonitorWriter<ActuationCmd>
}

/// Read handles of every monitor in the simulator.
#[derive(Debug, Clone)]
pub struct Readers {
    pub clock: ClockReader,
    pub robot: MonitorReader<RobotState>,
    pub params: MonitorReader<ControlParams>,
    pub reference: MonitorReader<RefSignal>,
    pub ref_model_x: MonitorReader<RefModelState>,
    pub ref_model_y: MonitorReader<RefModelState>,
    pub ctrl_cmd: MonitorReader<ControlCmd>,
    pub act_cmd: MonitorReader<ActuationCmd>
}

/// One consistent-per-monitor view of all shared state.
///
/// Each field is read under its own lock, one after the other.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct Snapshot {
    pub time_s: f64,
    pub terminated: bool,
    pub robot: RobotState,
    pub params: ControlParams,
    pub reference: RefSignal,
    pub ref_model_x: RefModelState,
    pub ref_model_y: RefModelState,
    pub ctrl_cmd: ControlCmd,
    pub act_cmd: ActuationCmd
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl<T: Copy> MonitorWriter<T> {
    /// Overwrite the payload.
    pub fn write(&self, value: T) {
        *lock(&self.cell) = value;
    }

    /// Copy the current payload out.
    ///
    /// The owner reads back its own previous output through this.
    pub fn read(&self) -> T {
        *lock(&self.cell)
    }

    /// Create a new read handle on the same monitor.
    pub fn reader(&self) -> MonitorReader<T> {
        MonitorReader { cell: self.cell.clone() }
    }
}

impl<T: Copy> MonitorReader<T> {
    /// Copy the current payload out.
    pub fn read(&self) -> T {
        *lock(&self.cell)
    }
}

impl<T> Clone for MonitorReader<T> {
    fn clone(&self) -> Self {
        Self { cell: self.cell.clone() }
    }
}

impl Readers {
    /// Read every monitor in turn.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            time_s: self.clock.time_s(),
            terminated: self.clock.is_terminated(),
            robot: self.robot.read(),
            params: self.params.read(),
            reference: self.reference.read(),
            ref_model_x: self.ref_model_x.read(),
            ref_model_y: self.ref_model_y.read(),
            ctrl_cmd: self.ctrl_cmd.read(),
            act_cmd: self.act_cmd.read()
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create a new monitor holding `initial`.
pub fn monitor<T: Copy>(initial: T) -> (MonitorWriter<T>, MonitorReader<T>) {
    let cell = Arc::new(Mutex::new(initial));

    (
        MonitorWriter { cell: cell.clone() },
        MonitorReader { cell }
    )
}

/// Allocate every monitor of the simulator.
///
/// All payloads start zeroed apart from the control parameters, which start
/// at the configured gains.
pub fn create(params: &SimParams) -> (Writers, Readers) {
    let (clock_w, clock_r) = clock::clock();
    let (robot_w, robot_r) = monitor(RobotState::default());
    let (params_w, params_r) = monitor(ControlParams {
        alpha1: params.gains.alpha1,
        alpha2: params.gains.alpha2
    });
    let (ref_w, ref_r) = monitor(RefSignal::default());
    let (rmx_w, rmx_r) = monitor(RefModelState::default());
    let (rmy_w, rmy_r) = monitor(RefModelState::default());
    let (ctrl_w, ctrl_r) = monitor(ControlCmd::default());
    let (act_w, act_r) = monitor(ActuationCmd::default());

    (
        Writers {
            clock: clock_w,
            robot: robot_w,
            params: params_w,
            reference: ref_w,
            ref_model_x: rmx_w,
            ref_model_y: rmy_w,
            ctrl_cmd: ctrl_w,
            act_cmd: act_w
        },
        Readers {
            clock: clock_r,
            robot: robot_r,
            params: params_r,
            reference: ref_r,
            ref_model_x: rmx_r,
            ref_model_y: rmy_r,
            ctrl_cmd: ctrl_r,
            act_cmd: act_r
        }
    )
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Lock a cell. Payloads are plain data, so a lock poisoned by a panicking
/// holder still contains a usable value.
fn lock<T>(cell: &Mutex<T>) -> MutexGuard<'_, T> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::thread;

    #[test]
    fn test_writer_visible_to_readers() {
        let (w, r) = monitor(ControlCmd::default());
        let r2 = r.clone();
        let r3 = w.reader();

        w.write(ControlCmd { v1: 0.5, v2: -0.25 });

        assert_eq!(r.read(), ControlCmd { v1: 0.5, v2: -0.25 });
        assert_eq!(r2.read(), r.read());
        assert_eq!(r3.read(), w.read());
    }

    #[test]
    fn test_initial_values() {
        let params = SimParams::default();
        let (w, r) = create(&params);

        let snap = r.snapshot();
        assert_eq!(snap.robot, RobotState::default());
        assert_eq!(snap.reference, RefSignal::default());
        assert_eq!(snap.act_cmd, ActuationCmd::default());
        assert_eq!(snap.params.alpha1, params.gains.alpha1);
        assert_eq!(snap.params.alpha2, params.gains.alpha2);
        assert_eq!(snap.time_s, 0.0);
        assert!(!snap.terminated);

        drop(w);
    }

    #[test]
    fn test_payload_never_torn() {
        // A writer keeps both fields equal, readers must never see them differ
        let (w, r) = monitor(RefSignal::default());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let r = r.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        let s = r.read();
                        assert_eq!(s.xref, s.yref);
                    }
                })
            })
            .collect();

        for i in 0..10_000 {
            w.write(RefSignal { xref: i as f64, yref: i as f64 });
        }

        for h in readers {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_poisoned_lock_recovered() {
        let (w, r) = monitor(ActuationCmd { u1: 1.0, u2: 2.0 });
        let cell = r.cell.clone();

        let _ = thread::spawn(move || {
            let _guard = cell.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert_eq!(r.read(), ActuationCmd { u1: 1.0, u2: 2.0 });
        w.write(ActuationCmd { u1: 0.0, u2: 0.0 });
        assert_eq!(r.read(), ActuationCmd::default());
    }
}
