//! Command Repeater
//!
//! Bridges one control program to one robot. Each call to
//! [`Repeater::run_once`] reads one line from the program, parses it and
//! routes it to the target chosen at construction:
//!
//! ```text
//!                                  ┌──▶ Simulated: SimulatedRobot::execute
//! program stdout ──line──▶ parse ──┼──▶ Serial: OI bytes ──▶ port ──▶ reply bytes
//!                                  └──▶ Detached: discarded
//! program stdin  ◀── "0xNN 0xNN ..." (only for commands that answer)
//! ```
//!
//! # Failure Semantics
//!
//! - Empty line: no-op
//! - Malformed or unsupported command: dropped with a warning
//! - Stream error: returned to the caller, which decides whether to retry
//!
//! The repeater owns no thread or timer; the caller drives it one line at
//! a time.

use crate::error::Result;
use crate::oi::text::{format_response, parse_tokens, tokenize};
use crate::oi::{Command, LinkCommand};
use crate::sim::SimulatedRobot;
use crate::transport::{Transport, read_exact_timeout, write_all};
use std::io::{BufRead, Write};
use std::time::Duration;

/// Default time allowed for a serial response
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Dispatch target, fixed for the repeater's lifetime
pub enum Target {
    /// Parsed commands go to a simulated robot
    Simulated(Box<dyn SimulatedRobot>),
    /// Commands are re-encoded as OI bytes on a serial port
    Serial(Box<dyn Transport>),
    /// No robot attached; lines are discarded
    Detached,
}

impl Target {
    pub fn name(&self) -> &'static str {
        match self {
            Target::Simulated(_) => "simulated",
            Target::Serial(_) => "serial",
            Target::Detached => "detached",
        }
    }
}

/// What happened to one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Routed to the target
    Dispatched,
    /// No tokens
    Empty,
    /// Malformed or unsupported command
    Dropped,
    /// Valid, but nothing to route it to
    Discarded,
    /// The program closed its output
    EndOfStream,
}

/// Line counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepeaterStats {
    pub lines: u64,
    pub dispatched: u64,
    pub dropped: u64,
    pub discarded: u64,
    pub responses: u64,
}

/// Bridge between one control program and one target
pub struct Repeater<R, W> {
    reader: R,
    writer: W,
    target: Target,
    response_timeout: Duration,
    line: Vec<u8>,
    stats: RepeaterStats,
}

impl<R: BufRead, W: Write> Repeater<R, W> {
    /// `reader` is the program's output, `writer` its input
    pub fn new(reader: R, writer: W, target: Target) -> Self {
        log::info!("Repeater bound to {} target", target.name());
        Self {
            reader,
            writer,
            target,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            line: Vec::new(),
            stats: RepeaterStats::default(),
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn stats(&self) -> RepeaterStats {
        self.stats
    }

    /// Read one line and dispatch it
    ///
    /// A read error aborts only this attempt; call again to retry.
    pub fn run_once(&mut self) -> Result<LineOutcome> {
        let mut line = std::mem::take(&mut self.line);
        line.clear();
        let result = match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => Ok(LineOutcome::EndOfStream),
            Ok(_) => match std::str::from_utf8(&line) {
                Ok(text) => self.dispatch_line(text),
                Err(e) => {
                    self.stats.lines += 1;
                    self.stats.dropped += 1;
                    let lossy = String::from_utf8_lossy(&line);
                    log::warn!("Dropping line {:?}: {}", lossy.trim_end(), e);
                    Ok(LineOutcome::Dropped)
                }
            },
            Err(e) => Err(e.into()),
        };
        self.line = line;
        result
    }

    /// Parse and route one line of text
    pub fn dispatch_line(&mut self, line: &str) -> Result<LineOutcome> {
        self.stats.lines += 1;
        let tokens = tokenize(line);
        if tokens.is_empty() {
            return Ok(LineOutcome::Empty);
        }

        let cmd = match parse_tokens(&tokens) {
            Ok(cmd) => cmd,
            Err(e) if e.is_protocol() => {
                log::warn!("Dropping line {:?}: {}", line.trim_end(), e);
                self.stats.dropped += 1;
                return Ok(LineOutcome::Dropped);
            }
            Err(e) => return Err(e),
        };

        let reply = match &mut self.target {
            Target::Detached => {
                log::trace!("No target, discarding {:?}", cmd);
                self.stats.discarded += 1;
                return Ok(LineOutcome::Discarded);
            }
            Target::Simulated(robot) => {
                log::debug!("SIM <- {:?}", cmd);
                robot.execute(&cmd)
            }
            Target::Serial(port) => match cmd {
                LinkCommand::PowerOn | LinkCommand::PowerOff => {
                    log::debug!("Serial robot has no remote power switch, discarding {:?}", cmd);
                    self.stats.discarded += 1;
                    return Ok(LineOutcome::Discarded);
                }
                // A robot answering on the port is on
                LinkCommand::PowerStatus => Some(vec![1]),
                LinkCommand::Oi(oi) => {
                    match control_serial(&mut **port, &oi, self.response_timeout) {
                        Ok(reply) => reply,
                        Err(e) => {
                            // Unblock a program waiting for this answer
                            if oi.opcode().response_len() > 0 {
                                let _ = writeln!(self.writer).and_then(|_| self.writer.flush());
                            }
                            return Err(e);
                        }
                    }
                }
            },
        };

        self.stats.dispatched += 1;
        if let Some(bytes) = reply.filter(|b| !b.is_empty()) {
            let response = format_response(&bytes);
            log::debug!("-> controller: {}", response);
            writeln!(self.writer, "{}", response)?;
            self.writer.flush()?;
            self.stats.responses += 1;
        }
        Ok(LineOutcome::Dispatched)
    }

    /// Give back the streams and the target
    pub fn into_parts(self) -> (R, W, Target) {
        (self.reader, self.writer, self.target)
    }
}

/// Write one command to a serial robot and collect its answer
fn control_serial(
    port: &mut dyn Transport,
    cmd: &Command,
    timeout: Duration,
) -> Result<Option<Vec<u8>>> {
    // Leftovers of an earlier timed-out answer would shift this one
    let stale = port.clear_input()?;
    if stale > 0 {
        log::debug!("Discarded {} stale byte(s) from the port", stale);
    }

    let bytes = cmd.to_bytes();
    log::trace!("TX: {:02X?}", bytes);
    write_all(port, &bytes)?;

    if let Command::Baud(code) = cmd {
        port.set_baud_rate(code.rate())?;
    }

    let expected = cmd.opcode().response_len();
    if expected == 0 {
        return Ok(None);
    }
    let mut reply = vec![0u8; expected];
    read_exact_timeout(port, &mut reply, timeout)?;
    log::trace!("RX: {:02X?}", reply);
    Ok(Some(reply))
}
