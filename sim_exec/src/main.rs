//! # Robot Control Simulator Executable
//!
//! Runs the closed loop simulation in real time:
//!
//!     - Create the session and initialise logging
//!     - Load and validate the parameters, store them in the session
//!     - Start the nine periodic tasks, each on its own thread
//!     - Wait for the clock to end the run and every task to stop
//!     - Store the task reports in the session
//!
//! The CSV archive of the run is written to the session's `arch` directory.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use chrono::Utc;
use color_eyre::{Result, eyre::WrapErr};
use log::{info, warn};
use std::io;
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use sim_lib::{
    params::SimParams,
    sim::Simulation,
    task::ExitReason
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    params::LoadError,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Parameter file used when none is given on the command line, relative to the
/// params directory.
const DEFAULT_PARAMS_FILE: &str = "sim_exec.toml";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Real-time differential drive robot control simulator.
#[derive(Debug, StructOpt)]
#[structopt(name = "sim_exec")]
struct Opt {
    /// Parameter file, defaults to `params/sim_exec.toml` under the software root
    #[structopt(short, long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Override the simulation horizon, in seconds
    #[structopt(long)]
    horizon: Option<f64>,

    /// Directory sessions are created in, relative to the software root
    #[structopt(long, default_value = "sessions")]
    sessions: String,

    /// Only log warnings and errors to the terminal
    #[structopt(short, long)]
    quiet: bool
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "sim_exec",
        &opt.sessions
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    let (min_level, console_level) = match opt.quiet {
        true => (LevelFilter::Info, LevelFilter::Warn),
        false => (LevelFilter::Trace, LevelFilter::Info)
    };
    logger_init(min_level, console_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Robot Control Simulator\n");
    info!("Running on: {}", host::get_platform());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut params = load_params(&opt)?;

    if let Some(h) = opt.horizon {
        info!("Horizon overridden from the command line: {} s", h);
        params.horizon_s = h;
    }

    params.validate().wrap_err("Invalid parameters")?;

    let params_path = session.save_json("params.json", &params)
        .wrap_err("Failed to save the parameters")?;

    info!("Parameters loaded and saved to {:?}", params_path);

    // ---- INITIALISE TASKS ----

    let sim = Simulation::new(&params, &session.arch_root)
        .wrap_err("Failed to initialise the simulation")?;

    info!("Archiving to {:?}", sim.archive_path());
    info!(
        "Simulating {:.2} s with a {:.3} s clock tick\n",
        params.horizon_s, params.clock_period_s
    );

    // ---- RUN ----

    let report = sim.run().wrap_err("Simulation failed")?;

    info!("All tasks joined after {:.3} s", report.elapsed_s);

    for r in report.tasks.iter() {
        let latency = match r.shutdown_latency_s {
            Some(l) => format!(", stopped {:.3} s after termination", l),
            None => String::new()
        };

        match r.exit {
            ExitReason::Failed(ref e) => warn!(
                "    {:12} failed after {} cycles: {}", r.name, r.num_cycles, e
            ),
            _ => info!(
                "    {:12} {:?} after {} cycles, {} overruns{}",
                r.name, r.exit, r.num_cycles, r.num_overruns, latency
            )
        }
    }

    session.save_json("task_reports.json", &report)
        .wrap_err("Failed to save the task reports")?;

    info!("Simulation finished at {}", Utc::now());

    println!("Simulation complete.");

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Load the parameter file given on the command line, or the default one.
///
/// A missing default file is not an error, all parameters then take their
/// default values.
fn load_params(opt: &Opt) -> Result<SimParams> {
    if let Some(ref path) = opt.params {
        info!("Loading parameters from {:?}", path);
        return util::params::load_path(path)
            .wrap_err_with(|| format!("Could not load parameters from {:?}", path));
    }

    match util::params::load(DEFAULT_PARAMS_FILE) {
        Ok(p) => Ok(p),
        Err(LoadError::FileLoadError(path, e)) if e.kind() == io::ErrorKind::NotFound => {
            warn!("No parameter file at {:?}, using the defaults", path);
            Ok(SimParams::default())
        },
        Err(e) => Err(e).wrap_err("Could not load the default parameters")
    }
}
