//! Primitives a control program uses to drive its robot

use super::limits::{clamp_drive_direct, clamp_drive_radius};
use super::link::CommandLink;
use super::session::Control;
use crate::error::{Error, Result};
use crate::oi::{Command, LinkCommand, SensorFrame, ir};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default polling interval of the cooperative waits
pub const DEFAULT_WAIT_TICK: Duration = Duration::from_millis(10);

/// Robot as seen by a control program
///
/// Every command goes out through the link in the order it was issued.
/// Odometry from each sensor poll is accumulated here so that waits and
/// IR queries can share one stream of sensor frames.
pub struct Robot {
    link: Box<dyn CommandLink>,
    control: Arc<Control>,
    tick: Duration,
    last_ir: u8,
    distance_mm: i64,
    angle_deg: i64,
}

impl Robot {
    pub fn new(link: impl CommandLink + 'static) -> Self {
        Self {
            link: Box::new(link),
            control: Arc::new(Control::new()),
            tick: DEFAULT_WAIT_TICK,
            last_ir: ir::NO_CODE,
            distance_mm: 0,
            angle_deg: 0,
        }
    }

    /// Set the polling interval of the waits
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub(crate) fn control(&self) -> Arc<Control> {
        self.control.clone()
    }

    /// True once the owning session was asked to stop
    pub fn is_stopped(&self) -> bool {
        self.control.is_stopped()
    }

    /// Send any OI command unchanged
    pub fn send(&mut self, cmd: Command) -> Result<()> {
        self.link.transact(&LinkCommand::Oi(cmd)).map(drop)
    }

    /// Start the OI and enter Safe mode
    pub fn start_safe(&mut self) -> Result<()> {
        self.send(Command::Start)?;
        self.send(Command::Safe)
    }

    pub fn power_on(&mut self) -> Result<()> {
        self.link.transact(&LinkCommand::PowerOn).map(drop)
    }

    pub fn power_off(&mut self) -> Result<()> {
        self.link.transact(&LinkCommand::PowerOff).map(drop)
    }

    /// Ask the link whether the robot is powered
    pub fn is_on(&mut self) -> Result<bool> {
        let reply = self.link.transact(&LinkCommand::PowerStatus)?;
        Ok(reply.first().is_some_and(|b| *b != 0))
    }

    /// Drive each wheel at its own speed (mm/s), saturated to ±500
    pub fn drive_direct(&mut self, left: i32, right: i32) -> Result<()> {
        let (left, right) = clamp_drive_direct(left, right);
        self.send(Command::DriveDirect { left, right })
    }

    /// Drive at `speed` (mm/s) along `radius` (mm)
    ///
    /// Speed saturates to ±500 and radius to ±2000, except for the radius
    /// sentinels which pass through.
    pub fn drive_radius(&mut self, speed: i32, radius: i32) -> Result<()> {
        let (speed, radius) = clamp_drive_radius(speed, radius);
        self.send(Command::Drive { speed, radius })
    }

    /// Stop both wheels
    pub fn halt(&mut self) -> Result<()> {
        self.send(Command::DriveDirect { left: 0, right: 0 })
    }

    pub fn send_ir_code(&mut self, code: u8) -> Result<()> {
        self.send(Command::SendIr(code))
    }

    /// Send IR bytes one at a time, in order
    pub fn send_ir_bytes(&mut self, codes: &[u8]) -> Result<()> {
        codes.iter().try_for_each(|code| self.send_ir_code(*code))
    }

    /// Most recent IR byte received, or 255 if none has arrived yet
    pub fn get_ir_code(&mut self) -> Result<u8> {
        self.poll()?;
        Ok(self.last_ir)
    }

    /// Wait `tenths` tenths of a second (at most 25.5 s)
    ///
    /// Returns false if the session was stopped before the time elapsed.
    pub fn wait_time(&mut self, tenths: u8) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_millis(tenths as u64 * 100);
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(true);
            }
            if !self.control.sleep(self.tick.min(deadline - now)) {
                return Ok(false);
            }
        }
    }

    /// Wait until the robot has travelled `distance` mm from here
    ///
    /// Negative distances wait for backward travel. Returns false if the
    /// session was stopped first.
    pub fn wait_distance(&mut self, distance: i32) -> Result<bool> {
        let target = distance as i64;
        // Frames report motion since the previous request, so flush that first
        self.poll()?;
        let start = self.distance_mm;
        self.wait_until(|robot| reached(robot.distance_mm - start, target))
    }

    /// Wait until the robot has turned `angle` degrees from here
    ///
    /// Positive angles are counter-clockwise. Returns false if the session
    /// was stopped first.
    pub fn wait_angle(&mut self, angle: i32) -> Result<bool> {
        let target = angle as i64;
        self.poll()?;
        let start = self.angle_deg;
        self.wait_until(|robot| reached(robot.angle_deg - start, target))
    }

    /// Total distance (mm) and angle (degrees) seen since creation
    pub fn odometry(&self) -> (i64, i64) {
        (self.distance_mm, self.angle_deg)
    }

    fn wait_until(&mut self, mut done: impl FnMut(&Self) -> bool) -> Result<bool> {
        loop {
            self.poll()?;
            if done(self) {
                return Ok(true);
            }
            if !self.control.sleep(self.tick) {
                return Ok(false);
            }
        }
    }

    /// Request one sensor frame and fold it into the accumulators
    fn poll(&mut self) -> Result<SensorFrame> {
        let reply = self.link.transact(&LinkCommand::Oi(Command::Sensors))?;
        let frame = SensorFrame::from_bytes(&reply).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "sensor reply has {} byte(s), expected {}",
                reply.len(),
                SensorFrame::LEN
            ))
        })?;
        if let Some(code) = frame.ir() {
            self.last_ir = code;
        }
        self.distance_mm += frame.distance_mm as i64;
        self.angle_deg += frame.angle_deg as i64;
        log::trace!(
            "Odometry: {} mm, {} deg, ir {}",
            self.distance_mm,
            self.angle_deg,
            self.last_ir
        );
        Ok(frame)
    }
}

fn reached(progress: i64, target: i64) -> bool {
    if target >= 0 {
        progress >= target
    } else {
        progress <= target
    }
}
