//! Setu - bridge daemon between a control program and a Create robot
//!
//! Builds (optionally) and launches a compiled control program, then
//! repeats every line it prints to the configured target until the
//! program exits or Ctrl-C is pressed.
//!
//! ```text
//! setu [--config setu.toml] [--target simulated|serial|loopback|none]
//!      [--port /dev/ttyUSB0] [-- PROGRAM ARGS...]
//! ```

use clap::Parser;
use setu::config::{AppConfig, TargetKind};
use setu::error::{Error, Result};
use setu::process::{run_build, spawn_controller};
use setu::repeater::{LineOutcome, Repeater, Target};
use setu::sim::{SimPort, SimRobot, SimulationCore};
use setu::transport::SerialTransport;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dispatch target: simulated, serial, loopback or none
    #[arg(short, long)]
    target: Option<TargetKind>,

    /// Serial port for the serial target
    #[arg(short, long)]
    port: Option<String>,

    /// Control program and its arguments (overrides [controller])
    #[arg(last = true)]
    program: Vec<String>,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Using config: {}", path.display());
            AppConfig::from_file(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(kind) = args.target {
        config.target.kind = kind;
    }
    if let Some(port) = &args.port {
        config.target.port = port.clone();
    }
    if let Some((program, rest)) = args.program.split_first() {
        config.controller.program = PathBuf::from(program);
        config.controller.args = rest.to_vec();
    }
    config.validate()?;
    Ok(config)
}

fn build_target(config: &AppConfig) -> Result<Target> {
    let simulated = || {
        let core = SimulationCore::new();
        core.add_robot(SimRobot::new("create", &config.simulation))
    };

    Ok(match config.target.kind {
        TargetKind::Simulated => Target::Simulated(Box::new(simulated())),
        TargetKind::Loopback => Target::Serial(Box::new(SimPort::new(simulated()))),
        TargetKind::Serial => Target::Serial(Box::new(SerialTransport::open(
            &config.target.port,
            config.target.baud_rate,
        )?)),
        TargetKind::None => Target::Detached,
    })
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Setu v{} starting...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = load_config(&args)?;

    match run_build(&config.controller.build) {
        Err(Error::Build(problem)) => {
            log::error!("Build failed with {}", problem);
            std::process::exit(problem.process_exit_code());
        }
        other => other?,
    }

    let target = build_target(&config)?;

    let mut child = spawn_controller(&config.controller.program, &config.controller.args)?;
    let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) else {
        return Err(Error::Other("control program streams unavailable".into()));
    };

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut repeater = Repeater::new(BufReader::new(stdout), stdin, target)
        .with_response_timeout(config.target.response_timeout());

    log::info!("Setu running. Press Ctrl-C to stop.");

    // One line per iteration; the repeater never retries on its own
    let mut failures = 0;
    while running.load(Ordering::Relaxed) {
        match repeater.run_once() {
            Ok(LineOutcome::EndOfStream) => {
                log::info!("Control program closed its output");
                break;
            }
            Ok(_) => failures = 0,
            Err(e) => {
                failures += 1;
                log::warn!(
                    "Repeater error ({}/{}): {}",
                    failures,
                    config.controller.max_read_failures,
                    e
                );
                if failures >= config.controller.max_read_failures {
                    log::error!("Too many consecutive errors, giving up");
                    break;
                }
            }
        }
    }

    // Shutdown
    log::info!("Shutting down...");
    let stats = repeater.stats();
    drop(repeater);
    match child.try_wait()? {
        Some(status) => log::info!("Control program exited: {}", status),
        None => {
            log::info!("Stopping control program (pid {})", child.id());
            child.kill()?;
            child.wait()?;
        }
    }

    log::info!(
        "Setu stopped: {} line(s), {} dispatched, {} dropped, {} discarded, {} response(s)",
        stats.lines,
        stats.dispatched,
        stats.dropped,
        stats.discarded,
        stats.responses
    );
    Ok(())
}
