//! # Data logger
//!
//! Archives one CSV record of the control loop per period:
//!
//! ```text
//! t,xref,yref,x1,x2,x3,y1,y2,v1,v2,u1,u2
//! ```
//!
//! The `t` column is the logger's own counter, `k * period_s`, and is not read
//! from the simulation clock. The two drift apart whenever the logger is
//! delayed, so `t` is the nominal time of the record rather than the
//! simulated time its values were sampled at.
//!
//! The archive is opened on the first cycle. If it cannot be opened, or a
//! record cannot be written, only the logger stops.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Internal
use crate::clock::num_whole_periods;
use crate::monitors::{ActuationCmd, ControlCmd, MonitorReader, RefSignal, RobotState};
use crate::task::{Cycle, PeriodicTask, TaskError};
use util::archive::Archiver;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Header row of the archive.
pub const HEADER: [&str; 12] = [
    "t", "xref", "yref", "x1", "x2", "x3", "y1", "y2", "v1", "v2", "u1", "u2"
];

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Parameters of the data logger.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    /// Task period
    ///
    /// Units: seconds
    pub period_s: f64,

    /// Name of the CSV file, relative to the archive directory
    pub file_name: String
}

/// One record of the archive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record {
    /// Logger time
    ///
    /// Units: seconds
    pub t: f64,
    pub reference: RefSignal,
    pub robot: RobotState,
    pub cmd: ControlCmd,
    pub act: ActuationCmd
}

/// The monitors read by [`DataLoggerTask`].
#[derive(Clone)]
pub struct LoggerReaders {
    pub reference: MonitorReader<RefSignal>,
    pub robot: MonitorReader<RobotState>,
    pub ctrl_cmd: MonitorReader<ControlCmd>,
    pub act_cmd: MonitorReader<ActuationCmd>
}

/// The data logger task.
pub struct DataLoggerTask {
    path: PathBuf,
    archiver: Option<Archiver>,

    period: Duration,
    period_s: f64,

    /// Number of records to write before finishing
    max_records: u64,
    num_records: u64,

    readers: LoggerReaders
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            period_s: 0.05,
            file_name: String::from("output.csv")
        }
    }
}

impl Record {
    /// Format the record's fields, 2 decimals for the time and 4 for every
    /// other value.
    pub fn fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(HEADER.len());

        fields.push(format!("{:.2}", self.t));

        let values = [
            self.reference.xref,
            self.reference.yref,
            self.robot.x1,
            self.robot.x2,
            self.robot.x3,
            self.robot.y1,
            self.robot.y2,
            self.cmd.v1,
            self.cmd.v2,
            self.act.u1,
            self.act.u2
        ];
        fields.extend(values.iter().map(|v| format!("{:.4}", v)));

        fields
    }
}

impl DataLoggerTask {
    /// Create a logger writing to `archive_dir/params.file_name`, covering
    /// `horizon_s` seconds.
    pub fn new<P: AsRef<Path>>(
        params: &Params,
        archive_dir: P,
        horizon_s: f64,
        readers: LoggerReaders
    ) -> Self {
        Self {
            path: archive_dir.as_ref().join(&params.file_name),
            archiver: None,
            period: Duration::from_secs_f64(params.period_s),
            period_s: params.period_s,
            max_records: num_whole_periods(horizon_s, params.period_s) + 1,
            num_records: 0,
            readers
        }
    }

    /// Number of records the logger writes over a full run.
    pub fn max_records(&self) -> u64 {
        self.max_records
    }

    /// Path of the archive.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn archiver(&mut self) -> Result<&mut Archiver, TaskError> {
        let archiver = match self.archiver.take() {
            Some(a) => a,
            None => {
                let a = Archiver::from_path(&self.path, &HEADER)?;
                info!("Data logger archiving to {:?}", self.path);
                a
            }
        };

        Ok(self.archiver.get_or_insert(archiver))
    }
}

impl PeriodicTask for DataLoggerTask {
    fn name(&self) -> &'static str {
        "data_logger"
    }

    fn period(&self) -> Duration {
        self.period
    }

    fn cycle(&mut self) -> Result<Cycle, TaskError> {
        let t = self.num_records as f64 * self.period_s;

        // One monitor at a time
        let record = Record {
            t,
            reference: self.readers.reference.read(),
            robot: self.readers.robot.read(),
            cmd: self.readers.ctrl_cmd.read(),
            act: self.readers.act_cmd.read()
        };

        self.archiver()?.write_row(record.fields().as_slice())?;
        self.num_records += 1;

        debug!("Logged record {} at t = {:.2}", self.num_records, t);

        if self.num_records >= self.max_records {
            info!("Data logger wrote all {} records", self.num_records);
            return Ok(Cycle::Finished);
        }

        Ok(Cycle::Continue)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
