//! Configuration for the Setu bridge
//!
//! Loads configuration from a TOML file. Every field has a default, so a
//! partial file (or none at all) is valid.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Control program to build and launch
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Compiled control program
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Arguments passed to the control program
    #[serde(default)]
    pub args: Vec<String>,

    /// Optional build command run before launch (program followed by arguments)
    #[serde(default)]
    pub build: Vec<String>,

    /// Consecutive stream errors tolerated before giving up
    #[serde(default = "default_max_read_failures")]
    pub max_read_failures: u32,
}

/// Where repeated commands go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Simulated robot fed with parsed commands
    Simulated,
    /// Real robot on a serial port
    Serial,
    /// Simulated robot behind a fake serial port (exercises the byte path)
    Loopback,
    /// Discard every line
    None,
}

impl FromStr for TargetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Ok(TargetKind::Simulated),
            "serial" | "real" => Ok(TargetKind::Serial),
            "loopback" => Ok(TargetKind::Loopback),
            "none" => Ok(TargetKind::None),
            other => Err(Error::Config(format!("unknown target kind: {}", other))),
        }
    }
}

/// Target selection and serial settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    #[serde(default = "default_target_kind")]
    pub kind: TargetKind,

    /// Serial port path (e.g. "/dev/ttyUSB0")
    #[serde(default = "default_port")]
    pub port: String,

    /// Initial serial baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Time allowed for a complete serial response
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

/// Simulated robot parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Distance between the drive wheels (mm)
    #[serde(default = "default_wheel_base_mm")]
    pub wheel_base_mm: f32,

    /// Simulated seconds per wall-clock second
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f32,

    #[serde(default)]
    pub start_x_mm: f32,

    #[serde(default)]
    pub start_y_mm: f32,

    /// Initial heading (degrees, CCW from +X)
    #[serde(default)]
    pub start_heading_deg: f32,
}

/// Controller session timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Polling interval of cooperative waits (ms)
    #[serde(default = "default_wait_tick_ms")]
    pub wait_tick_ms: u64,
}

fn default_program() -> PathBuf {
    PathBuf::from("./target/debug/square")
}

fn default_max_read_failures() -> u32 {
    3
}

fn default_target_kind() -> TargetKind {
    TargetKind::Simulated
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    57600 // Create power-on default
}

fn default_response_timeout_ms() -> u64 {
    500
}

fn default_wheel_base_mm() -> f32 {
    258.0
}

fn default_speed_factor() -> f32 {
    1.0
}

fn default_wait_tick_ms() -> u64 {
    10
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            build: Vec::new(),
            max_read_failures: default_max_read_failures(),
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            kind: default_target_kind(),
            port: default_port(),
            baud_rate: default_baud_rate(),
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            wheel_base_mm: default_wheel_base_mm(),
            speed_factor: default_speed_factor(),
            start_x_mm: 0.0,
            start_y_mm: 0.0,
            start_heading_deg: 0.0,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait_tick_ms: default_wait_tick_ms(),
        }
    }
}

impl TargetConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl SessionConfig {
    pub fn wait_tick(&self) -> Duration {
        Duration::from_millis(self.wait_tick_ms)
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("setu.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.simulation.wheel_base_mm <= 0.0 {
            return Err(Error::Config("simulation.wheel_base_mm must be positive".into()));
        }
        if self.simulation.speed_factor <= 0.0 {
            return Err(Error::Config("simulation.speed_factor must be positive".into()));
        }
        if self.session.wait_tick_ms == 0 {
            return Err(Error::Config("session.wait_tick_ms must be at least 1".into()));
        }
        if self.target.kind == TargetKind::Serial && self.target.port.is_empty() {
            return Err(Error::Config("target.port is required for serial".into()));
        }
        Ok(())
    }
}
