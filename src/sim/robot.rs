//! Simulated Create robot
//!
//! Applies OI commands to a robot model: power, OI mode, LEDs, demos,
//! drivers, IR and wheel speeds. Pose advances through [`PhysicsState`]
//! either against the wall clock or under manual stepping.
//!
//! # Mode Gating
//!
//! | Command | Off | Passive | Safe / Full |
//! |---------|-----|---------|-------------|
//! | Start | → Passive | → Passive | → Passive |
//! | Baud, Safe, Full, demos | ignored | applied | applied |
//! | Drive, LEDs, drivers, IR, song | ignored | ignored | applied |
//! | Sensors | answered | answered | answered |
//!
//! Sensors is answered in every mode so a waiting control program never
//! blocks on a robot that ignores it.

use super::physics::{PhysicsState, wheel_velocities};
use crate::config::SimulationConfig;
use crate::oi::{BaudCode, Command, Demo, LinkCommand, MAX_SPEED, Radius, SensorFrame, ir};
use std::time::Instant;

/// OI operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OiMode {
    Off,
    Passive,
    Safe,
    Full,
}

/// LED state as last commanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedState {
    pub bits: u8,
    pub color: u8,
    pub intensity: u8,
}

/// How simulated time advances
#[derive(Debug, Clone, Copy)]
enum Clock {
    /// Advance by elapsed wall-clock time on every command
    RealTime(Instant),
    /// Advance only through [`SimRobot::step`]
    Manual,
}

/// One simulated robot
#[derive(Debug)]
pub struct SimRobot {
    name: String,
    powered: bool,
    mode: OiMode,
    baud: Option<BaudCode>,
    leds: LedState,
    demo: Option<Demo>,
    low_side_drivers: u8,
    pwm_duty: [u8; 3],
    digital_outputs: u8,
    song: Option<u8>,
    /// Commanded wheel speeds (mm/s)
    left_speed: f32,
    right_speed: f32,
    physics: PhysicsState,
    wheel_base: f32,
    speed_factor: f32,
    clock: Clock,
    /// Motion not yet reported through Sensors
    distance_acc: f32,
    angle_acc: f32,
    ir_received: u8,
    ir_outbox: Vec<u8>,
}

impl SimRobot {
    /// Powered robot in Off mode, advancing in real time
    pub fn new(name: &str, config: &SimulationConfig) -> Self {
        Self {
            name: name.to_string(),
            powered: true,
            mode: OiMode::Off,
            baud: BaudCode::from_rate(57600),
            leds: LedState::default(),
            demo: None,
            low_side_drivers: 0,
            pwm_duty: [0; 3],
            digital_outputs: 0,
            song: None,
            left_speed: 0.0,
            right_speed: 0.0,
            physics: PhysicsState::new(
                config.start_x_mm,
                config.start_y_mm,
                config.start_heading_deg.to_radians(),
            ),
            wheel_base: config.wheel_base_mm,
            speed_factor: config.speed_factor,
            clock: Clock::RealTime(Instant::now()),
            distance_acc: 0.0,
            angle_acc: 0.0,
            ir_received: ir::NO_CODE,
            ir_outbox: Vec::new(),
        }
    }

    /// Switch to manual time: the pose only moves through [`SimRobot::step`]
    pub fn with_manual_clock(mut self) -> Self {
        self.clock = Clock::Manual;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn mode(&self) -> OiMode {
        self.mode
    }

    pub fn baud(&self) -> Option<BaudCode> {
        self.baud
    }

    pub fn leds(&self) -> LedState {
        self.leds
    }

    pub fn demo(&self) -> Option<Demo> {
        self.demo
    }

    pub fn low_side_drivers(&self) -> u8 {
        self.low_side_drivers
    }

    pub fn pwm_duty(&self) -> [u8; 3] {
        self.pwm_duty
    }

    pub fn digital_outputs(&self) -> u8 {
        self.digital_outputs
    }

    pub fn song(&self) -> Option<u8> {
        self.song
    }

    /// Commanded (left, right) wheel speeds in mm/s
    pub fn wheel_speeds(&self) -> (f32, f32) {
        (self.left_speed, self.right_speed)
    }

    /// Pose as (x mm, y mm, heading degrees)
    pub fn pose(&self) -> (f32, f32, f32) {
        (
            self.physics.x(),
            self.physics.y(),
            self.physics.theta().to_degrees(),
        )
    }

    /// Last IR byte received from another robot (255 if none)
    pub fn ir_received(&self) -> u8 {
        self.ir_received
    }

    /// Deliver an IR byte sent by another robot
    pub fn receive_ir(&mut self, code: u8) {
        self.ir_received = code;
    }

    /// IR bytes this robot sent since the last call
    pub fn take_ir_outbox(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.ir_outbox)
    }

    /// Advance the simulation by `dt` simulated seconds
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let motion = self
            .physics
            .update(dt, self.left_speed, self.right_speed, self.wheel_base);
        self.distance_acc += motion.distance;
        self.angle_acc += motion.rotation.to_degrees();
    }

    /// Catch up with the wall clock
    fn advance(&mut self) {
        if let Clock::RealTime(last) = self.clock {
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f32() * self.speed_factor;
            self.clock = Clock::RealTime(now);
            self.step(dt);
        }
    }

    /// Apply a line-protocol command; returns the response bytes, if any
    pub fn execute(&mut self, cmd: &LinkCommand) -> Option<Vec<u8>> {
        self.advance();
        match cmd {
            LinkCommand::Oi(cmd) => self.apply(cmd),
            LinkCommand::PowerOn => {
                if !self.powered {
                    log::info!("{}: power on", self.name);
                }
                self.powered = true;
                None
            }
            LinkCommand::PowerOff => {
                if self.powered {
                    log::info!("{}: power off", self.name);
                }
                self.powered = false;
                self.mode = OiMode::Off;
                self.demo = None;
                self.set_wheels(0.0, 0.0);
                None
            }
            LinkCommand::PowerStatus => Some(vec![self.powered as u8]),
        }
    }

    /// Apply an OI command; returns the response bytes, if any
    pub fn apply(&mut self, cmd: &Command) -> Option<Vec<u8>> {
        if let Command::Sensors = cmd {
            return Some(self.sensor_frame().to_bytes().to_vec());
        }

        if !self.accepts(cmd) {
            log::debug!("{}: ignoring {} in {:?} mode", self.name, cmd, self.mode);
            return None;
        }
        log::debug!("{}: {}", self.name, cmd);

        match *cmd {
            Command::Start => {
                self.set_mode(OiMode::Passive);
                self.demo = None;
                self.set_wheels(0.0, 0.0);
            }
            Command::Baud(code) => self.baud = Some(code),
            Command::Safe => self.set_mode(OiMode::Safe),
            Command::Full => self.set_mode(OiMode::Full),
            Command::DemoSpot => self.start_demo(Demo::SpotCover),
            Command::DemoCover => self.start_demo(Demo::Cover),
            Command::DemoCoverAndDock => self.start_demo(Demo::CoverAndDock),
            Command::Demo(Demo::Abort) => {
                log::info!("{}: demo aborted", self.name);
                self.demo = None;
                self.set_mode(OiMode::Passive);
                self.set_wheels(0.0, 0.0);
            }
            Command::Demo(demo) => self.start_demo(demo),
            Command::Drive { speed, radius } => {
                let (left, right) = self.radius_to_wheels(speed as f32, radius);
                self.set_wheels(left, right);
            }
            Command::DriveDirect { left, right } => self.set_wheels(left as f32, right as f32),
            Command::LowSideDrivers(bits) => self.low_side_drivers = bits,
            Command::Leds {
                bits,
                color,
                intensity,
            } => {
                self.leds = LedState {
                    bits,
                    color,
                    intensity,
                }
            }
            Command::PlaySong(number) => self.song = Some(number),
            Command::PwmLowSideDrivers(duty) => self.pwm_duty = duty,
            Command::DigitalOutputs(bits) => self.digital_outputs = bits,
            Command::SendIr(code) => self.ir_outbox.push(code),
            Command::Sensors => {}
        }
        None
    }

    fn accepts(&self, cmd: &Command) -> bool {
        if !self.powered {
            return false;
        }
        match cmd {
            Command::Start | Command::Sensors => true,
            Command::Baud(_)
            | Command::Safe
            | Command::Full
            | Command::DemoSpot
            | Command::DemoCover
            | Command::DemoCoverAndDock
            | Command::Demo(_) => self.mode != OiMode::Off,
            _ => matches!(self.mode, OiMode::Safe | OiMode::Full),
        }
    }

    fn set_mode(&mut self, mode: OiMode) {
        if self.mode != mode {
            log::info!("{}: {:?} -> {:?}", self.name, self.mode, mode);
            self.mode = mode;
        }
    }

    /// Demos run in Passive mode; their motion is not modelled
    fn start_demo(&mut self, demo: Demo) {
        log::info!("{}: demo {:?}", self.name, demo);
        self.demo = Some(demo);
        self.set_mode(OiMode::Passive);
        self.set_wheels(0.0, 0.0);
    }

    fn set_wheels(&mut self, left: f32, right: f32) {
        self.left_speed = left;
        self.right_speed = right;
    }

    /// Wheel speeds for a Drive command
    ///
    /// Radius 1 and the Spin sentinel turn in place (CCW and CW). Other
    /// curves keep the commanded average speed, scaled down if the outer
    /// wheel would exceed the speed limit.
    fn radius_to_wheels(&self, speed: f32, radius: Radius) -> (f32, f32) {
        match radius {
            Radius::StraightRight | Radius::StraightLeft | Radius::Curve(0) => (speed, speed),
            Radius::Spin => (speed, -speed),
            Radius::Curve(1) => (-speed, speed),
            Radius::Curve(r) => {
                let (left, right) = wheel_velocities(speed, r as f32, self.wheel_base);
                let fastest = left.abs().max(right.abs());
                let limit = MAX_SPEED as f32;
                if fastest > limit {
                    let scale = limit / fastest;
                    (left * scale, right * scale)
                } else {
                    (left, right)
                }
            }
        }
    }

    /// Report and reset the motion accumulated since the last request
    ///
    /// Sub-unit remainders carry over to the next frame.
    fn sensor_frame(&mut self) -> SensorFrame {
        let distance = self
            .distance_acc
            .round()
            .clamp(i16::MIN as f32, i16::MAX as f32);
        let angle = self
            .angle_acc
            .round()
            .clamp(i16::MIN as f32, i16::MAX as f32);
        self.distance_acc -= distance;
        self.angle_acc -= angle;

        SensorFrame {
            ir_code: self.ir_received,
            buttons: 0,
            distance_mm: distance as i16,
            angle_deg: angle as i16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn robot() -> SimRobot {
        SimRobot::new("test", &SimulationConfig::default()).with_manual_clock()
    }

    fn safe_robot() -> SimRobot {
        let mut robot = robot();
        robot.apply(&Command::Start);
        robot.apply(&Command::Safe);
        robot
    }

    fn frame(robot: &mut SimRobot) -> SensorFrame {
        let bytes = robot.apply(&Command::Sensors).unwrap();
        SensorFrame::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_mode_transitions() {
        let mut robot = robot();
        assert_eq!(robot.mode(), OiMode::Off);

        robot.apply(&Command::Safe);
        assert_eq!(robot.mode(), OiMode::Off, "Safe needs Start first");

        robot.apply(&Command::Start);
        assert_eq!(robot.mode(), OiMode::Passive);
        robot.apply(&Command::Full);
        assert_eq!(robot.mode(), OiMode::Full);
        robot.apply(&Command::Start);
        assert_eq!(robot.mode(), OiMode::Passive);
    }

    #[test]
    fn test_actuators_ignored_in_passive() {
        let mut robot = robot();
        robot.apply(&Command::Start);
        robot.apply(&Command::DriveDirect {
            left: 100,
            right: 100,
        });
        robot.apply(&Command::Leds {
            bits: 8,
            color: 128,
            intensity: 255,
        });
        assert_eq!(robot.wheel_speeds(), (0.0, 0.0));
        assert_eq!(robot.leds(), LedState::default());
    }

    #[test]
    fn test_leds_and_drivers_in_safe() {
        let mut robot = safe_robot();
        robot.apply(&Command::Leds {
            bits: 8,
            color: 128,
            intensity: 255,
        });
        robot.apply(&Command::PwmLowSideDrivers([10, 20, 30]));
        robot.apply(&Command::DigitalOutputs(0b101));
        robot.apply(&Command::PlaySong(2));
        assert_eq!(
            robot.leds(),
            LedState {
                bits: 8,
                color: 128,
                intensity: 255
            }
        );
        assert_eq!(robot.pwm_duty(), [10, 20, 30]);
        assert_eq!(robot.digital_outputs(), 0b101);
        assert_eq!(robot.song(), Some(2));
    }

    #[test]
    fn test_demo_returns_to_passive() {
        let mut robot = safe_robot();
        robot.apply(&Command::DriveDirect {
            left: 100,
            right: 100,
        });
        robot.apply(&Command::Demo(Demo::FigureEight));
        assert_eq!(robot.demo(), Some(Demo::FigureEight));
        assert_eq!(robot.mode(), OiMode::Passive);
        assert_eq!(robot.wheel_speeds(), (0.0, 0.0));

        robot.apply(&Command::Demo(Demo::Abort));
        assert_eq!(robot.demo(), None);
        assert_eq!(robot.mode(), OiMode::Passive);
    }

    #[test]
    fn test_drive_straight_accumulates_distance() {
        let mut robot = safe_robot();
        robot.apply(&Command::Drive {
            speed: 200,
            radius: Radius::StraightLeft,
        });
        robot.step(0.5);
        robot.step(0.5);

        let (x, y, heading) = robot.pose();
        assert_relative_eq!(x, 200.0, epsilon = 1e-2);
        assert_relative_eq!(y, 0.0, epsilon = 1e-2);
        assert_relative_eq!(heading, 0.0, epsilon = 1e-3);

        let f = frame(&mut robot);
        assert_eq!(f.distance_mm, 200);
        assert_eq!(f.angle_deg, 0);
        // Accumulators reset after each report
        assert_eq!(frame(&mut robot).distance_mm, 0);
    }

    #[test]
    fn test_spin_sentinel_turns_clockwise() {
        let mut robot = safe_robot();
        robot.apply(&Command::Drive {
            speed: 100,
            radius: Radius::Spin,
        });
        assert_eq!(robot.wheel_speeds(), (100.0, -100.0));

        // Quarter turn: wheel arc = (π/2) * 129 mm
        let quarter = std::f32::consts::FRAC_PI_2 * 129.0 / 100.0;
        robot.step(quarter);
        let f = frame(&mut robot);
        assert_eq!(f.angle_deg, -90);
        assert_eq!(f.distance_mm, 0);
    }

    #[test]
    fn test_tight_curve_respects_speed_limit() {
        let mut robot = safe_robot();
        robot.apply(&Command::Drive {
            speed: 500,
            radius: Radius::Curve(200),
        });
        let (left, right) = robot.wheel_speeds();
        assert!(right > left);
        assert!(right <= 500.0 + 1e-3);
    }

    #[test]
    fn test_power_cycle() {
        let mut robot = safe_robot();
        assert_eq!(robot.execute(&LinkCommand::PowerStatus), Some(vec![1]));
        robot.execute(&LinkCommand::PowerOff);
        assert_eq!(robot.execute(&LinkCommand::PowerStatus), Some(vec![0]));
        assert_eq!(robot.mode(), OiMode::Off);

        robot.apply(&Command::Start);
        assert_eq!(robot.mode(), OiMode::Off, "powered off robot ignores Start");

        robot.execute(&LinkCommand::PowerOn);
        robot.apply(&Command::Start);
        assert_eq!(robot.mode(), OiMode::Passive);
    }

    #[test]
    fn test_ir_outbox_and_receive() {
        let mut robot = safe_robot();
        robot.apply(&Command::SendIr(ir::REMOTE_SPOT));
        robot.apply(&Command::SendIr(ir::REMOTE_CLEAN));
        assert_eq!(
            robot.take_ir_outbox(),
            vec![ir::REMOTE_SPOT, ir::REMOTE_CLEAN]
        );
        assert!(robot.take_ir_outbox().is_empty());

        assert_eq!(frame(&mut robot).ir(), None);
        robot.receive_ir(ir::HOME_BASE_GREEN);
        assert_eq!(frame(&mut robot).ir_code, ir::HOME_BASE_GREEN);
    }

    #[test]
    fn test_start_pose_from_config() {
        let config = SimulationConfig {
            start_x_mm: 100.0,
            start_y_mm: -50.0,
            start_heading_deg: 90.0,
            ..SimulationConfig::default()
        };
        let robot = SimRobot::new("placed", &config);
        let (x, y, heading) = robot.pose();
        assert_relative_eq!(x, 100.0);
        assert_relative_eq!(y, -50.0);
        assert_relative_eq!(heading, 90.0, epsilon = 1e-3);
    }
}
