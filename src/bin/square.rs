//! Sample control program: drive a square
//!
//! Speaks the line protocol on stdout/stdin, so it is meant to be launched
//! by `setu`. Logs go to stderr.

use clap::Parser;
use setu::config::AppConfig;
use setu::controller::{LineLink, Robot, RobotProgram, Session, SessionState};
use setu::error::Result;
use setu::oi::LED_ADVANCE;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Side length (mm)
    #[arg(long, default_value = "500")]
    side_mm: i32,

    /// Wheel speed (mm/s)
    #[arg(long, default_value = "200")]
    speed: i32,

    /// Number of laps
    #[arg(long, default_value = "1")]
    laps: u32,

    /// Setu configuration file (for the wait tick)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

struct Square {
    side_mm: i32,
    speed: i32,
    sides_total: u32,
    sides_done: u32,
}

impl RobotProgram for Square {
    fn init(&mut self, robot: &mut Robot) -> Result<()> {
        robot.power_on()?;
        robot.start_safe()?;
        robot.send(setu::Command::Leds {
            bits: LED_ADVANCE,
            color: 0,
            intensity: 255,
        })
    }

    fn step(&mut self, robot: &mut Robot) -> Result<()> {
        if self.sides_done >= self.sides_total {
            robot.halt()?;
            robot.wait_time(1)?;
            return Ok(());
        }

        robot.drive_direct(self.speed, self.speed)?;
        if !robot.wait_distance(self.side_mm)? {
            return Ok(());
        }
        // Radius 1 turns in place counter-clockwise
        robot.drive_radius(self.speed, 1)?;
        robot.wait_angle(90)?;
        robot.halt()?;

        self.sides_done += 1;
        log::info!("Side {}/{} done", self.sides_done, self.sides_total);
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let sides_total = args.laps * 4;
    let program = Square {
        side_mm: args.side_mm,
        speed: args.speed,
        sides_total,
        sides_done: 0,
    };

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    let robot = Robot::new(LineLink::stdio()).with_tick(config.session.wait_tick());

    let mut session = Session::new("square", robot, program);
    session.start()?;

    // The program idles once the square is done; the extra iteration marks that
    while session.iterations() <= sides_total as u64 && session.state() != SessionState::Stopped
    {
        thread::sleep(Duration::from_millis(50));
    }

    session.stop();
    session.join()?;
    log::info!("Square finished");
    Ok(())
}
