//! Error types for Setu

use crate::oi::Opcode;
use crate::process::BuildProblem;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Setu error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error on a controller or serial stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial response did not arrive in time
    #[error("Communication timeout")]
    Timeout,

    /// Peer closed its end of the stream
    #[error("Stream disconnected")]
    Disconnected,

    /// Command word that is neither a mnemonic nor a numeric opcode
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Opcode byte outside the OI vocabulary
    #[error("Unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// Opcode that exists in OI but has no fixed-width encoding here
    #[error("Unsupported opcode: {0:?}")]
    UnsupportedOpcode(Opcode),

    /// Wrong number of parameter tokens for a command
    #[error("{command} expects {expected} parameter(s), got {actual}")]
    ParameterCount {
        command: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Parameter that does not fit its encoding
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Control program build failed
    #[error("Build failed:\n{0}")]
    Build(BuildProblem),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Controller session was already started
    #[error("Controller session already started")]
    AlreadyStarted,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for malformed or unsupported commands.
    ///
    /// These are dropped by the repeater; everything else is surfaced.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::UnknownCommand(_)
                | Error::UnknownOpcode(_)
                | Error::UnsupportedOpcode(_)
                | Error::ParameterCount { .. }
                | Error::InvalidParameter(_)
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
