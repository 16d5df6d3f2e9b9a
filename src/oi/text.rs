//! Text line protocol spoken by control programs
//!
//! A control program running as a separate process prints one command per
//! line on its standard output and reads answers on its standard input.
//!
//! # Line Format
//!
//! ```text
//! <command> [<param> ...]\n
//! ```
//!
//! - Tokens are separated by runs of whitespace
//! - `<command>` is a mnemonic (`LED`, `drive_direct`) or an opcode number
//! - Numbers are decimal (`-200`) or hex (`0x00C8`)
//! - Two-byte parameters accept -32768..=65535 (signed or raw word)
//! - `PowerOn`, `PowerOff` and `RobotIsOn` are link-level meta commands
//!
//! The C control library emits the hex form, e.g. `0x89 0x00C8 0x8000`.
//!
//! # Responses
//!
//! One line of space-separated `0xNN` byte tokens, e.g. `0xFF 0x00 0x00 0x0A 0x00 0x00`.

use super::{Command, Opcode, ParamKind};
use crate::error::{Error, Result};
use std::fmt::Write as _;

/// A parsed line: an OI command or a link-level meta command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCommand {
    Oi(Command),
    /// Switch the robot on
    PowerOn,
    /// Switch the robot off
    PowerOff,
    /// Ask whether the robot is on (answered with one byte)
    PowerStatus,
}

impl LinkCommand {
    /// Number of response bytes the controller waits for
    pub fn response_len(&self) -> usize {
        match self {
            LinkCommand::Oi(cmd) => cmd.opcode().response_len(),
            LinkCommand::PowerStatus => 1,
            LinkCommand::PowerOn | LinkCommand::PowerOff => 0,
        }
    }
}

impl From<Command> for LinkCommand {
    fn from(cmd: Command) -> Self {
        LinkCommand::Oi(cmd)
    }
}

/// Split a line into tokens on runs of whitespace
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Parse a whole line; `Ok(None)` for a line without tokens
pub fn parse_line(line: &str) -> Result<Option<LinkCommand>> {
    let tokens = tokenize(line);
    if tokens.is_empty() {
        return Ok(None);
    }
    parse_tokens(&tokens).map(Some)
}

/// Parse a non-empty token list
pub fn parse_tokens(tokens: &[&str]) -> Result<LinkCommand> {
    let Some((head, params)) = tokens.split_first() else {
        return Err(Error::UnknownCommand(String::new()));
    };

    if let Some(meta) = parse_meta(head) {
        if !params.is_empty() {
            return Err(Error::ParameterCount {
                command: meta_name(meta),
                expected: 0,
                actual: params.len(),
            });
        }
        return Ok(meta);
    }

    let opcode = resolve_opcode(head)?;
    if !opcode.is_fixed_width() {
        return Err(Error::UnsupportedOpcode(opcode));
    }

    let kinds = opcode.params();
    if params.len() != kinds.len() {
        return Err(Error::ParameterCount {
            command: opcode.mnemonic(),
            expected: kinds.len(),
            actual: params.len(),
        });
    }

    let mut payload = Vec::with_capacity(opcode.encoded_len() - 1);
    for (token, kind) in params.iter().zip(kinds) {
        let value = parse_number(token)?;
        match kind {
            ParamKind::U8 => {
                let byte = u8::try_from(value).map_err(|_| {
                    Error::InvalidParameter(format!("{} does not fit in a byte", token))
                })?;
                payload.push(byte);
            }
            ParamKind::I16 => {
                if !(-32768..=65535).contains(&value) {
                    return Err(Error::InvalidParameter(format!(
                        "{} does not fit in 16 bits",
                        token
                    )));
                }
                payload.extend_from_slice(&(value as u16).to_be_bytes());
            }
        }
    }

    Command::from_params(opcode, &payload).map(LinkCommand::Oi)
}

fn parse_meta(word: &str) -> Option<LinkCommand> {
    let normalized: String = word
        .chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    match normalized.as_str() {
        "POWERON" => Some(LinkCommand::PowerOn),
        "POWEROFF" => Some(LinkCommand::PowerOff),
        "ROBOTISON" => Some(LinkCommand::PowerStatus),
        _ => None,
    }
}

fn meta_name(meta: LinkCommand) -> &'static str {
    match meta {
        LinkCommand::PowerOn => "PowerOn",
        LinkCommand::PowerOff => "PowerOff",
        _ => "RobotIsOn",
    }
}

fn resolve_opcode(word: &str) -> Result<Opcode> {
    if let Some(op) = Opcode::from_mnemonic(word) {
        return Ok(op);
    }
    let Ok(value) = parse_number(word) else {
        return Err(Error::UnknownCommand(word.to_string()));
    };
    let byte = u8::try_from(value).map_err(|_| Error::UnknownCommand(word.to_string()))?;
    Opcode::from_u8(byte).ok_or(Error::UnknownOpcode(byte))
}

/// Parse a decimal or `0x` hex integer, optionally negative
pub fn parse_number(token: &str) -> Result<i64> {
    let not_a_number = || Error::InvalidParameter(format!("not a number: {}", token));
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    let (radix, body) = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    // One sign only, and never after the prefix
    if body.starts_with(['+', '-']) {
        return Err(not_a_number());
    }
    let value = i64::from_str_radix(body, radix).map_err(|_| not_a_number())?;
    Ok(if negative { -value } else { value })
}

/// Format a command the way the C control library prints it
///
/// Opcode and byte parameters as `0xNN`, word parameters as `0xNNNN`.
pub fn format_command(cmd: &Command) -> String {
    let bytes = cmd.to_bytes();
    let mut line = format!("0x{:02X}", bytes[0]);
    let mut offset = 1;
    for kind in cmd.opcode().params() {
        match kind {
            ParamKind::U8 => {
                let _ = write!(line, " 0x{:02X}", bytes[offset]);
            }
            ParamKind::I16 => {
                let word = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
                let _ = write!(line, " 0x{:04X}", word);
            }
        }
        offset += kind.width();
    }
    line
}

/// Format any link command as a protocol line (without newline)
pub fn format_link_command(cmd: &LinkCommand) -> String {
    match cmd {
        LinkCommand::Oi(cmd) => format_command(cmd),
        meta => meta_name(*meta).to_string(),
    }
}

/// Format response bytes as a protocol line (without newline)
pub fn format_response(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a response line back into bytes
pub fn parse_response(line: &str) -> Result<Vec<u8>> {
    tokenize(line)
        .into_iter()
        .map(|token| {
            let value = parse_number(token)?;
            u8::try_from(value).map_err(|_| {
                Error::InvalidParameter(format!("response token {} is not a byte", token))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oi::{Demo, Radius};

    #[test]
    fn test_tokenize_led_line() {
        let tokens = tokenize("LED 8 128 255");
        assert_eq!(tokens, vec!["LED", "8", "128", "255"]);
        assert_eq!(tokenize("  LED\t8   128 255 \r\n").len(), 4);
        assert!(tokenize("   \n").is_empty());
    }

    #[test]
    fn test_parse_led_mnemonic() {
        let cmd = parse_line("LED 8 128 255").unwrap();
        assert_eq!(
            cmd,
            Some(LinkCommand::Oi(Command::Leds {
                bits: 8,
                color: 128,
                intensity: 255
            }))
        );
    }

    #[test]
    fn test_empty_line_is_not_a_command() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line(" \t ").unwrap(), None);
    }

    #[test]
    fn test_parse_c_library_hex_form() {
        // cm_drive(200, MIN_INT16)
        let cmd = parse_line("0x89 0x00C8 0x8000").unwrap();
        assert_eq!(
            cmd,
            Some(LinkCommand::Oi(Command::Drive {
                speed: 200,
                radius: Radius::StraightLeft
            }))
        );

        // cm_direct_drive(right=-100, left=100): right wheel first
        let cmd = parse_line("0x91 0xFF9C 0x0064").unwrap();
        assert_eq!(
            cmd,
            Some(LinkCommand::Oi(Command::DriveDirect {
                left: 100,
                right: -100
            }))
        );
    }

    #[test]
    fn test_parse_signed_words_and_decimal_opcodes() {
        let cmd = parse_tokens(&["137", "-200", "-2000"]).unwrap();
        assert_eq!(
            cmd,
            LinkCommand::Oi(Command::Drive {
                speed: -200,
                radius: Radius::Curve(-2000)
            })
        );
        assert_eq!(
            parse_tokens(&["demo", "255"]).unwrap(),
            LinkCommand::Oi(Command::Demo(Demo::Abort))
        );
    }

    #[test]
    fn test_parse_number_signs() {
        assert_eq!(parse_number("-5").unwrap(), -5);
        assert_eq!(parse_number("+5").unwrap(), 5);
        assert_eq!(parse_number("-0x10").unwrap(), -16);
        for bad in ["--5", "+-5", "-+5", "0x-5", "0x+5", "-0x-5", "-", "0x"] {
            assert!(
                matches!(parse_number(bad), Err(Error::InvalidParameter(_))),
                "{} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_parse_meta_commands() {
        assert_eq!(parse_tokens(&["PowerOn"]).unwrap(), LinkCommand::PowerOn);
        assert_eq!(parse_tokens(&["POWER_OFF"]).unwrap(), LinkCommand::PowerOff);
        assert_eq!(parse_tokens(&["RobotIsOn"]).unwrap(), LinkCommand::PowerStatus);
        assert_eq!(LinkCommand::PowerStatus.response_len(), 1);
        assert!(matches!(
            parse_tokens(&["PowerOn", "1"]),
            Err(Error::ParameterCount { expected: 0, .. })
        ));
    }

    #[test]
    fn test_protocol_errors() {
        assert!(matches!(
            parse_tokens(&["FLY", "1"]),
            Err(Error::UnknownCommand(_))
        ));
        assert!(matches!(
            parse_tokens(&["0x10"]),
            Err(Error::UnknownOpcode(0x10))
        ));
        assert!(matches!(
            parse_tokens(&["LED", "8", "128"]),
            Err(Error::ParameterCount {
                command: "LEDS",
                expected: 3,
                actual: 2
            })
        ));
        assert!(matches!(
            parse_tokens(&["LED", "8", "128", "256"]),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            parse_tokens(&["DRIVE", "100", "70000"]),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            parse_tokens(&["SONG", "0", "1"]),
            Err(Error::UnsupportedOpcode(Opcode::Song))
        ));
        assert!(matches!(
            parse_tokens(&["BAUD", "twelve"]),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_format_matches_c_library() {
        let line = format_command(&Command::Drive {
            speed: 200,
            radius: Radius::StraightLeft,
        });
        assert_eq!(line, "0x89 0x00C8 0x8000");

        let line = format_command(&Command::SendIr(130));
        assert_eq!(line, "0x97 0x82");

        assert_eq!(format_command(&Command::Sensors), "0x8E");
    }

    #[test]
    fn test_formatted_lines_parse_back() {
        let commands = [
            Command::Start,
            Command::DriveDirect {
                left: -500,
                right: 500,
            },
            Command::Leds {
                bits: 0x0A,
                color: 0,
                intensity: 255,
            },
            Command::PwmLowSideDrivers([1, 2, 3]),
        ];
        for cmd in commands {
            let line = format_command(&cmd);
            assert_eq!(parse_line(&line).unwrap(), Some(LinkCommand::Oi(cmd)));
        }
    }

    #[test]
    fn test_response_lines() {
        assert_eq!(format_response(&[0xFF, 0x00, 0x0A]), "0xFF 0x00 0x0A");
        assert_eq!(
            parse_response("0xFF 0x00 0x0A\n").unwrap(),
            vec![0xFF, 0x00, 0x0A]
        );
        assert!(parse_response("0x100").is_err());
    }
}
