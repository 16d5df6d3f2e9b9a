//! Setu - Open Interface command bridge for iRobot Create robots
//!
//! A control program, running as its own process or on a session thread,
//! issues OI commands; Setu routes them to a simulated robot or to a real
//! robot on a serial port and carries sensor answers back.
//!
//! - [`oi`]: opcode vocabulary, byte encoding, text line protocol
//! - [`controller`]: what control programs are written against
//! - [`repeater`]: line-at-a-time bridge from a program to its target
//! - [`sim`]: simulated robots and the shared simulation core
//! - [`transport`]: serial byte streams

pub mod config;
pub mod controller;
pub mod error;
pub mod oi;
pub mod process;
pub mod repeater;
pub mod sim;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use controller::{Robot, RobotProgram, Session};
pub use error::{Error, Result};
pub use oi::{Command, LinkCommand, Opcode};
pub use repeater::{LineOutcome, Repeater, Target};
