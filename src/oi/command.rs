//! Typed OI commands and their byte encoding
//!
//! - [`Command`]: one fully-parameterized OI command
//! - [`Command::decode`]: all-or-nothing decoding from a byte slice
//! - [`CommandDecoder`]: buffering decoder for byte streams that arrive in
//!   arbitrary chunks (serial reads)

use super::{
    BaudCode, Demo, Opcode, RADIUS_SPIN, RADIUS_STRAIGHT_LEFT, RADIUS_STRAIGHT_RIGHT,
};
use crate::error::{Error, Result};
use std::fmt;

/// Turn radius of a Drive command
///
/// Three raw 16-bit values are reserved and never treated as a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radius {
    /// Curve radius in mm, positive turns left
    Curve(i16),
    /// 0x7FFF: straight, drifting slightly right
    StraightRight,
    /// 0x8000: straight, drifting slightly left
    StraightLeft,
    /// 0xFFFF: spin in place
    Spin,
}

impl Radius {
    /// Classify a caller-supplied radius as one of the reserved values
    pub fn sentinel(value: i32) -> Option<Self> {
        match value {
            RADIUS_STRAIGHT_RIGHT => Some(Radius::StraightRight),
            RADIUS_STRAIGHT_LEFT => Some(Radius::StraightLeft),
            RADIUS_SPIN => Some(Radius::Spin),
            _ => None,
        }
    }

    /// Interpret a raw wire word
    pub fn from_wire(raw: u16) -> Self {
        match raw {
            0x7fff => Radius::StraightRight,
            0x8000 => Radius::StraightLeft,
            0xffff => Radius::Spin,
            _ => Radius::Curve(raw as i16),
        }
    }

    /// Raw wire word
    pub fn to_wire(self) -> u16 {
        match self {
            Radius::Curve(r) => r as u16,
            Radius::StraightRight => 0x7fff,
            Radius::StraightLeft => 0x8000,
            Radius::Spin => 0xffff,
        }
    }

    /// Value as passed to the controller API (sentinels as their constants)
    pub fn value(self) -> i32 {
        match self {
            Radius::Curve(r) => r as i32,
            Radius::StraightRight => RADIUS_STRAIGHT_RIGHT,
            Radius::StraightLeft => RADIUS_STRAIGHT_LEFT,
            Radius::Spin => RADIUS_SPIN,
        }
    }
}

/// OI command with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the OI / return to Passive mode
    Start,
    Baud(BaudCode),
    Safe,
    Full,
    DemoSpot,
    DemoCover,
    DemoCoverAndDock,
    Demo(Demo),
    /// Speed (mm/s) along a radius
    Drive { speed: i16, radius: Radius },
    /// Individual wheel speeds (mm/s); sent right wheel first
    DriveDirect { left: i16, right: i16 },
    LowSideDrivers(u8),
    /// Advance/Play bits, power LED color (0 green - 255 red), intensity
    Leds { bits: u8, color: u8, intensity: u8 },
    PlaySong(u8),
    /// Request a [`SensorFrame`](super::SensorFrame)
    Sensors,
    PwmLowSideDrivers([u8; 3]),
    DigitalOutputs(u8),
    SendIr(u8),
}

/// Outcome of decoding from the front of a byte slice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A whole command occupying `len` bytes
    Complete { command: Command, len: usize },
    /// Not enough bytes yet; `needed` more are required
    Incomplete { needed: usize },
}

impl Command {
    /// Opcode of this command
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Start => Opcode::Start,
            Command::Baud(_) => Opcode::Baud,
            Command::Safe => Opcode::Safe,
            Command::Full => Opcode::Full,
            Command::DemoSpot => Opcode::DemoSpot,
            Command::DemoCover => Opcode::DemoCover,
            Command::DemoCoverAndDock => Opcode::DemoCoverAndDock,
            Command::Demo(_) => Opcode::Demo,
            Command::Drive { .. } => Opcode::Drive,
            Command::DriveDirect { .. } => Opcode::DriveDirect,
            Command::LowSideDrivers(_) => Opcode::LowSideDrivers,
            Command::Leds { .. } => Opcode::Leds,
            Command::PlaySong(_) => Opcode::PlaySong,
            Command::Sensors => Opcode::Sensors,
            Command::PwmLowSideDrivers(_) => Opcode::PwmLowSideDrivers,
            Command::DigitalOutputs(_) => Opcode::DigitalOutputs,
            Command::SendIr(_) => Opcode::SendIr,
        }
    }

    /// Append the encoded command to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode().code());
        match *self {
            Command::Start
            | Command::Safe
            | Command::Full
            | Command::DemoSpot
            | Command::DemoCover
            | Command::DemoCoverAndDock
            | Command::Sensors => {}
            Command::Baud(code) => out.push(code.code()),
            Command::Demo(demo) => out.push(demo as u8),
            Command::Drive { speed, radius } => {
                out.extend_from_slice(&speed.to_be_bytes());
                out.extend_from_slice(&radius.to_wire().to_be_bytes());
            }
            Command::DriveDirect { left, right } => {
                out.extend_from_slice(&right.to_be_bytes());
                out.extend_from_slice(&left.to_be_bytes());
            }
            Command::Leds {
                bits,
                color,
                intensity,
            } => out.extend_from_slice(&[bits, color, intensity]),
            Command::PwmLowSideDrivers(duty) => out.extend_from_slice(&duty),
            Command::LowSideDrivers(b)
            | Command::PlaySong(b)
            | Command::DigitalOutputs(b)
            | Command::SendIr(b) => out.push(b),
        }
    }

    /// Encoded bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.opcode().encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// Decode one command from the front of `buf`
    ///
    /// Never consumes a partial command: either every parameter byte is
    /// present and `Complete` is returned, or `Incomplete`.
    pub fn decode(buf: &[u8]) -> Result<Decoded> {
        let Some(&first) = buf.first() else {
            return Ok(Decoded::Incomplete { needed: 1 });
        };
        let opcode = Opcode::from_u8(first).ok_or(Error::UnknownOpcode(first))?;
        if !opcode.is_fixed_width() {
            return Err(Error::UnsupportedOpcode(opcode));
        }

        let len = opcode.encoded_len();
        if buf.len() < len {
            return Ok(Decoded::Incomplete {
                needed: len - buf.len(),
            });
        }

        let command = Self::from_params(opcode, &buf[1..len])?;
        Ok(Decoded::Complete { command, len })
    }

    /// Build a command from its opcode and raw parameter bytes
    pub fn from_params(opcode: Opcode, params: &[u8]) -> Result<Self> {
        let expected = opcode.encoded_len() - 1;
        if !opcode.is_fixed_width() {
            return Err(Error::UnsupportedOpcode(opcode));
        }
        if params.len() != expected {
            return Err(Error::InvalidParameter(format!(
                "{} takes {} parameter byte(s), got {}",
                opcode.mnemonic(),
                expected,
                params.len()
            )));
        }

        let word = |i: usize| u16::from_be_bytes([params[i], params[i + 1]]);

        let command = match opcode {
            Opcode::Start => Command::Start,
            Opcode::Safe => Command::Safe,
            Opcode::Full => Command::Full,
            Opcode::DemoSpot => Command::DemoSpot,
            Opcode::DemoCover => Command::DemoCover,
            Opcode::DemoCoverAndDock => Command::DemoCoverAndDock,
            Opcode::Sensors => Command::Sensors,
            Opcode::Baud => Command::Baud(BaudCode::new(params[0]).ok_or_else(|| {
                Error::InvalidParameter(format!("baud code {} outside 0-11", params[0]))
            })?),
            Opcode::Demo => Command::Demo(Demo::from_u8(params[0]).ok_or_else(|| {
                Error::InvalidParameter(format!("unknown demo code {}", params[0]))
            })?),
            Opcode::Drive => Command::Drive {
                speed: word(0) as i16,
                radius: Radius::from_wire(word(2)),
            },
            Opcode::DriveDirect => Command::DriveDirect {
                right: word(0) as i16,
                left: word(2) as i16,
            },
            Opcode::LowSideDrivers => Command::LowSideDrivers(params[0]),
            Opcode::Leds => Command::Leds {
                bits: params[0],
                color: params[1],
                intensity: params[2],
            },
            Opcode::PlaySong => Command::PlaySong(params[0]),
            Opcode::PwmLowSideDrivers => {
                Command::PwmLowSideDrivers([params[0], params[1], params[2]])
            }
            Opcode::DigitalOutputs => Command::DigitalOutputs(params[0]),
            Opcode::SendIr => Command::SendIr(params[0]),
            Opcode::Song => return Err(Error::UnsupportedOpcode(opcode)),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().mnemonic();
        match *self {
            Command::Baud(code) => write!(f, "{} {} ({} bps)", name, code.code(), code.rate()),
            Command::Demo(demo) => write!(f, "{} {:?}", name, demo),
            Command::Drive { speed, radius } => write!(f, "{} {} {:?}", name, speed, radius),
            Command::DriveDirect { left, right } => {
                write!(f, "{} left={} right={}", name, left, right)
            }
            Command::Leds {
                bits,
                color,
                intensity,
            } => write!(f, "{} {:#04x} {} {}", name, bits, color, intensity),
            Command::PwmLowSideDrivers([a, b, c]) => write!(f, "{} {} {} {}", name, a, b, c),
            Command::LowSideDrivers(b)
            | Command::PlaySong(b)
            | Command::DigitalOutputs(b)
            | Command::SendIr(b) => write!(f, "{} {}", name, b),
            _ => f.write_str(name),
        }
    }
}

/// Buffering decoder for OI byte streams
///
/// Bytes are pushed as they arrive; complete commands are pulled out in
/// order. A malformed command is dropped and decoding resumes after it.
#[derive(Debug, Default)]
pub struct CommandDecoder {
    buffer: Vec<u8>,
    dropped: u64,
}

impl CommandDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pull the next complete command, skipping malformed ones
    pub fn next_command(&mut self) -> Option<Command> {
        loop {
            if self.buffer.first() == Some(&(Opcode::Song as u8)) {
                // Song: number, note count, then (note, duration) pairs
                let len = 3 + 2 * *self.buffer.get(2)? as usize;
                if self.buffer.len() < len {
                    return None;
                }
                log::warn!("Dropping {} byte(s): song definitions are unsupported", len);
                self.buffer.drain(..len);
                self.dropped += 1;
                continue;
            }
            match Command::decode(&self.buffer) {
                Ok(Decoded::Complete { command, len }) => {
                    self.buffer.drain(..len);
                    return Some(command);
                }
                Ok(Decoded::Incomplete { .. }) => return None,
                Err(e) => {
                    // Skip the whole command when its length is known
                    let skip = Opcode::from_u8(self.buffer[0])
                        .filter(|op| op.is_fixed_width())
                        .map(|op| op.encoded_len())
                        .unwrap_or(1);
                    log::warn!("Dropping {} byte(s): {}", skip, e);
                    self.buffer.drain(..skip);
                    self.dropped += 1;
                }
            }
        }
    }

    /// Bytes waiting for the rest of their command
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Number of malformed commands skipped so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_direct_sends_right_wheel_first() {
        let bytes = Command::DriveDirect {
            left: -500,
            right: 500,
        }
        .to_bytes();
        assert_eq!(bytes, vec![145, 0x01, 0xF4, 0xFE, 0x0C]);
    }

    #[test]
    fn test_drive_direct_decodes_to_same_pair() {
        let cmd = Command::DriveDirect {
            left: -500,
            right: 500,
        };
        let decoded = Command::decode(&cmd.to_bytes()).unwrap();
        assert_eq!(
            decoded,
            Decoded::Complete {
                command: cmd,
                len: 5
            }
        );
    }

    #[test]
    fn test_drive_radius_sentinels_on_wire() {
        let straight = Command::Drive {
            speed: 200,
            radius: Radius::StraightLeft,
        };
        assert_eq!(straight.to_bytes(), vec![137, 0x00, 0xC8, 0x80, 0x00]);

        let spin = Command::Drive {
            speed: -100,
            radius: Radius::Spin,
        };
        assert_eq!(spin.to_bytes(), vec![137, 0xFF, 0x9C, 0xFF, 0xFF]);

        let curve = Command::Drive {
            speed: 100,
            radius: Radius::Curve(-2000),
        };
        match Command::decode(&curve.to_bytes()).unwrap() {
            Decoded::Complete { command, .. } => assert_eq!(command, curve),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_radius_classification() {
        assert_eq!(Radius::sentinel(0x7fff), Some(Radius::StraightRight));
        assert_eq!(Radius::sentinel(0x8000), Some(Radius::StraightLeft));
        assert_eq!(Radius::sentinel(0xffff), Some(Radius::Spin));
        assert_eq!(Radius::sentinel(-1), None);
        assert_eq!(Radius::Spin.value(), 0xffff);
        assert_eq!(Radius::from_wire(0x07D0), Radius::Curve(2000));
    }

    #[test]
    fn test_partial_command_is_incomplete() {
        let bytes = Command::Leds {
            bits: 8,
            color: 128,
            intensity: 255,
        }
        .to_bytes();

        for cut in 0..bytes.len() {
            let result = Command::decode(&bytes[..cut]).unwrap();
            assert_eq!(
                result,
                Decoded::Incomplete {
                    needed: bytes.len() - cut
                }
            );
        }
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Command::decode(&[0x01]),
            Err(Error::UnknownOpcode(0x01))
        ));
        assert!(matches!(
            Command::decode(&[140, 0, 1, 60, 32]),
            Err(Error::UnsupportedOpcode(Opcode::Song))
        ));
        assert!(matches!(
            Command::decode(&[129, 12]),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            Command::decode(&[136, 42]),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_decoder_handles_chunked_input() {
        let mut stream = Vec::new();
        Command::Start.encode_into(&mut stream);
        Command::Safe.encode_into(&mut stream);
        Command::DriveDirect {
            left: 100,
            right: -100,
        }
        .encode_into(&mut stream);
        Command::SendIr(ir_code()).encode_into(&mut stream);

        let mut decoder = CommandDecoder::new();
        let mut commands = Vec::new();
        for chunk in stream.chunks(3) {
            decoder.push(chunk);
            while let Some(cmd) = decoder.next_command() {
                commands.push(cmd);
            }
        }

        assert_eq!(
            commands,
            vec![
                Command::Start,
                Command::Safe,
                Command::DriveDirect {
                    left: 100,
                    right: -100
                },
                Command::SendIr(ir_code()),
            ]
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_skips_malformed_commands() {
        let mut decoder = CommandDecoder::new();
        // garbage byte, bad baud code, then a valid Full
        decoder.push(&[0x00, 129, 40, 132]);
        assert_eq!(decoder.next_command(), Some(Command::Full));
        assert_eq!(decoder.dropped(), 2);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_decoder_skips_whole_song() {
        let mut decoder = CommandDecoder::new();
        // song 0 with one note: pitch 60, duration 137
        decoder.push(&[140, 0, 1, 60]);
        assert_eq!(decoder.next_command(), None);
        assert_eq!(decoder.pending(), 4);

        decoder.push(&[137, 131]);
        assert_eq!(decoder.next_command(), Some(Command::Safe));
        assert_eq!(decoder.dropped(), 1);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_display() {
        let cmd = Command::DriveDirect {
            left: 10,
            right: -10,
        };
        assert_eq!(cmd.to_string(), "DRIVE_DIRECT left=10 right=-10");
        assert_eq!(Command::Sensors.to_string(), "SENSORS");
    }

    fn ir_code() -> u8 {
        crate::oi::ir::REMOTE_PAUSE
    }
}
