//! Closed loop runs of the full simulator in real time.

use std::f64::consts::PI;
use std::fs;
use std::path::PathBuf;

use sim_lib::{
    interface::GainStep,
    monitors::ControlParams,
    params::SimParams,
    sim::Simulation,
    task::ExitReason
};

fn archive_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sim_exec_closed_loop_{}", name));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn short_run() -> SimParams {
    SimParams {
        horizon_s: 1.0,
        ..SimParams::default()
    }
}

#[test]
fn test_one_second_run() {
    let dir = archive_dir("one_second");
    let sim = Simulation::new(&short_run(), &dir).unwrap();
    let readers = sim.readers();
    let csv_path = sim.archive_path().to_path_buf();

    let report = sim.run().unwrap();

    // ---- Every task stopped cleanly ----

    assert_eq!(report.tasks.len(), 9);
    assert!(report.failed().is_empty(), "{:?}", report.failed());

    for r in report.tasks.iter() {
        match r.name {
            "clock" | "data_logger" => assert_eq!(r.exit, ExitReason::Finished, "{}", r.name),
            _ => assert_eq!(r.exit, ExitReason::Terminated, "{}", r.name)
        }

        // Observed within one of its own periods, plus scheduling slack
        if let Some(l) = r.shutdown_latency_s {
            assert!(l <= r.period_s + 0.1, "{} stopped {} s after termination", r.name, l);
        }
    }

    assert!(report.elapsed_s >= 1.0 && report.elapsed_s < 3.0, "{}", report.elapsed_s);

    let snapshot = readers.snapshot();
    assert!(snapshot.terminated);
    assert!((snapshot.time_s - 1.0).abs() < 1e-9);

    // The robot has started to move towards the reference
    assert!(snapshot.robot.x1 != 0.0 || snapshot.robot.x2 != 0.0);

    // ---- Archive ----

    let content = fs::read_to_string(&csv_path).unwrap();
    let mut lines = content.lines();

    assert_eq!(lines.next(), Some("t,xref,yref,x1,x2,x3,y1,y2,v1,v2,u1,u2"));

    let rows: Vec<Vec<f64>> = lines
        .map(|l| l.split(',').map(|f| f.parse().unwrap()).collect())
        .collect();

    // floor(1.0 / 0.05) + 1
    assert_eq!(rows.len(), 21);

    for (k, row) in rows.iter().enumerate() {
        assert_eq!(row.len(), 12);
        assert!((row[0] - k as f64 * 0.05).abs() < 1e-9);

        // Heading, rounded to 4 decimals
        assert!(row[5] > -PI - 1e-4 && row[5] <= 3.1416);

        // Saturation bounds
        assert!(row[8].abs() <= 1.0 && row[9].abs() <= 1.0, "row {}", k);
        assert!(row[10].abs() <= 1.0 && row[11].abs() <= 3.0, "row {}", k);
    }
}

#[test]
fn test_gain_schedule() {
    let dir = archive_dir("gain_schedule");
    let mut params = short_run();
    params.interface.period_s = 0.1;
    params.interface.gain_schedule = vec![GainStep {
        at_s: 0.5,
        alpha1: 1.5,
        alpha2: 2.0
    }];

    let sim = Simulation::new(&params, &dir).unwrap();
    let readers = sim.readers();

    assert_eq!(readers.params.read(), ControlParams { alpha1: 3.0, alpha2: 3.0 });

    let report = sim.run().unwrap();
    assert!(report.failed().is_empty());

    assert_eq!(readers.params.read(), ControlParams { alpha1: 1.5, alpha2: 2.0 });
}

#[test]
fn test_logger_failure_is_isolated() {
    let dir = std::env::temp_dir()
        .join("sim_exec_closed_loop_missing")
        .join("not_created");

    let mut params = short_run();
    params.horizon_s = 0.3;

    let report = Simulation::new(&params, &dir).unwrap().run().unwrap();

    let failed = report.failed();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "data_logger");
    assert_eq!(failed[0].num_cycles, 1);

    // The rest of the simulator ran to the horizon
    let clock = report.tasks.iter().find(|r| r.name == "clock").unwrap();
    assert_eq!(clock.exit, ExitReason::Finished);
    assert_eq!(clock.num_cycles, 5);
}
