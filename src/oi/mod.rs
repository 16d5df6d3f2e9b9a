//! iRobot Open Interface (OI) vocabulary
//!
//! Compiled-in table of command opcodes, their parameter layouts, and the
//! named parameter values (demo codes, baud codes, radius sentinels, LED
//! bits, IR codes) used by Create and Roomba robots.
//!
//! # Wire Format
//!
//! ```text
//! ┌────────────┬──────────────────────────────┐
//! │ Opcode (1) │ Parameters (fixed per opcode)│
//! └────────────┴──────────────────────────────┘
//! ```
//!
//! No checksum and no framing: the opcode alone fixes the command length.
//! Two-byte parameters are big-endian.
//!
//! | Opcode | Command | Parameters |
//! |--------|---------|------------|
//! | 128 | Start / Passive | - |
//! | 129 | Baud | code (u8, 0-11) |
//! | 131 | Safe | - |
//! | 132 | Full | - |
//! | 134 | Spot demo | - |
//! | 135 | Cover demo | - |
//! | 136 | Demo | demo code (u8) |
//! | 137 | Drive | speed (i16), radius (i16) |
//! | 138 | Low side drivers | bits (u8) |
//! | 139 | LEDs | bits (u8), color (u8), intensity (u8) |
//! | 140 | Song | variable, unsupported |
//! | 141 | Play song | song number (u8) |
//! | 142 | Sensors | - |
//! | 143 | Cover and dock demo | - |
//! | 144 | PWM low side drivers | 3 x duty (u8) |
//! | 145 | Drive direct | right (i16), left (i16) |
//! | 147 | Digital outputs | bits (u8) |
//! | 151 | Send IR | byte (u8) |

pub mod command;
pub mod text;

pub use command::{Command, CommandDecoder, Decoded, Radius};
pub use text::LinkCommand;

/// Command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Start the OI; also returns the robot to Passive mode
    Start = 128,
    Baud = 129,
    Safe = 131,
    Full = 132,
    DemoSpot = 134,
    DemoCover = 135,
    Demo = 136,
    Drive = 137,
    LowSideDrivers = 138,
    Leds = 139,
    /// Variable-length song definition (not part of the fixed vocabulary)
    Song = 140,
    PlaySong = 141,
    Sensors = 142,
    DemoCoverAndDock = 143,
    PwmLowSideDrivers = 144,
    DriveDirect = 145,
    DigitalOutputs = 147,
    SendIr = 151,
}

/// Encoding of a single command parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Unsigned byte
    U8,
    /// Signed 16-bit word, big-endian
    I16,
}

impl ParamKind {
    /// Encoded width in bytes
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            ParamKind::U8 => 1,
            ParamKind::I16 => 2,
        }
    }
}

const NO_PARAMS: &[ParamKind] = &[];
const ONE_BYTE: &[ParamKind] = &[ParamKind::U8];
const THREE_BYTES: &[ParamKind] = &[ParamKind::U8, ParamKind::U8, ParamKind::U8];
const TWO_WORDS: &[ParamKind] = &[ParamKind::I16, ParamKind::I16];

/// Mnemonic lookup table (normalized: uppercase, no separators)
const MNEMONICS: &[(&str, Opcode)] = &[
    ("START", Opcode::Start),
    ("PASSIVE", Opcode::Start),
    ("BAUD", Opcode::Baud),
    ("SAFE", Opcode::Safe),
    ("FULL", Opcode::Full),
    ("SPOT", Opcode::DemoSpot),
    ("COVER", Opcode::DemoCover),
    ("CLEAN", Opcode::DemoCover),
    ("DEMO", Opcode::Demo),
    ("DRIVE", Opcode::Drive),
    ("LOWSIDEDRIVERS", Opcode::LowSideDrivers),
    ("LEDS", Opcode::Leds),
    ("LED", Opcode::Leds),
    ("SONG", Opcode::Song),
    ("PLAYSONG", Opcode::PlaySong),
    ("PLAY", Opcode::PlaySong),
    ("SENSORS", Opcode::Sensors),
    ("SENSOR", Opcode::Sensors),
    ("COVERANDDOCK", Opcode::DemoCoverAndDock),
    ("DOCK", Opcode::DemoCoverAndDock),
    ("PWMLOWSIDEDRIVERS", Opcode::PwmLowSideDrivers),
    ("DRIVEDIRECT", Opcode::DriveDirect),
    ("DRIVEWHEELS", Opcode::DriveDirect),
    ("DIGITALOUTPUTS", Opcode::DigitalOutputs),
    ("OUTPUTS", Opcode::DigitalOutputs),
    ("SENDIR", Opcode::SendIr),
    ("IR", Opcode::SendIr),
];

impl Opcode {
    /// Every opcode in the vocabulary
    pub const ALL: [Opcode; 18] = [
        Opcode::Start,
        Opcode::Baud,
        Opcode::Safe,
        Opcode::Full,
        Opcode::DemoSpot,
        Opcode::DemoCover,
        Opcode::Demo,
        Opcode::Drive,
        Opcode::LowSideDrivers,
        Opcode::Leds,
        Opcode::Song,
        Opcode::PlaySong,
        Opcode::Sensors,
        Opcode::DemoCoverAndDock,
        Opcode::PwmLowSideDrivers,
        Opcode::DriveDirect,
        Opcode::DigitalOutputs,
        Opcode::SendIr,
    ];

    /// Passive mode shares the Start opcode
    pub const PASSIVE: Opcode = Opcode::Start;

    /// Parse opcode from byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| *op as u8 == value)
    }

    /// Opcode byte
    #[inline]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Look up an opcode by mnemonic (`LED`, `drive_direct`, `DriveDirect`, ...)
    pub fn from_mnemonic(word: &str) -> Option<Self> {
        let normalized: String = word
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        MNEMONICS
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, op)| *op)
    }

    /// Canonical mnemonic used in logs and error messages
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Start => "START",
            Opcode::Baud => "BAUD",
            Opcode::Safe => "SAFE",
            Opcode::Full => "FULL",
            Opcode::DemoSpot => "SPOT",
            Opcode::DemoCover => "COVER",
            Opcode::Demo => "DEMO",
            Opcode::Drive => "DRIVE",
            Opcode::LowSideDrivers => "LOW_SIDE_DRIVERS",
            Opcode::Leds => "LEDS",
            Opcode::Song => "SONG",
            Opcode::PlaySong => "PLAY_SONG",
            Opcode::Sensors => "SENSORS",
            Opcode::DemoCoverAndDock => "COVER_AND_DOCK",
            Opcode::PwmLowSideDrivers => "PWM_LOW_SIDE_DRIVERS",
            Opcode::DriveDirect => "DRIVE_DIRECT",
            Opcode::DigitalOutputs => "DIGITAL_OUTPUTS",
            Opcode::SendIr => "SEND_IR",
        }
    }

    /// Parameter layout, in wire order
    pub const fn params(self) -> &'static [ParamKind] {
        match self {
            Opcode::Start
            | Opcode::Safe
            | Opcode::Full
            | Opcode::DemoSpot
            | Opcode::DemoCover
            | Opcode::DemoCoverAndDock
            | Opcode::Sensors
            | Opcode::Song => NO_PARAMS,
            Opcode::Baud
            | Opcode::Demo
            | Opcode::LowSideDrivers
            | Opcode::PlaySong
            | Opcode::DigitalOutputs
            | Opcode::SendIr => ONE_BYTE,
            Opcode::Leds | Opcode::PwmLowSideDrivers => THREE_BYTES,
            Opcode::Drive | Opcode::DriveDirect => TWO_WORDS,
        }
    }

    /// False only for Song, whose length depends on its contents
    #[inline]
    pub const fn is_fixed_width(self) -> bool {
        !matches!(self, Opcode::Song)
    }

    /// Total encoded length including the opcode byte
    pub fn encoded_len(self) -> usize {
        1 + self.params().iter().map(|p| p.width()).sum::<usize>()
    }

    /// Number of bytes the robot answers with
    pub const fn response_len(self) -> usize {
        match self {
            Opcode::Sensors => SensorFrame::LEN,
            _ => 0,
        }
    }
}

// ============================================================================
// Parameter constants
// ============================================================================

/// Serial rates selected by baud codes 0-11
pub const BAUD_RATES: [u32; 12] = [
    300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 28800, 38400, 57600, 115200,
];

/// Baud code (index into [`BAUD_RATES`])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudCode(u8);

impl BaudCode {
    /// Create from code, `None` if outside 0-11
    pub fn new(code: u8) -> Option<Self> {
        ((code as usize) < BAUD_RATES.len()).then_some(Self(code))
    }

    /// Find the code for a serial rate
    pub fn from_rate(rate: u32) -> Option<Self> {
        BAUD_RATES
            .iter()
            .position(|r| *r == rate)
            .map(|i| Self(i as u8))
    }

    #[inline]
    pub fn code(self) -> u8 {
        self.0
    }

    /// Serial rate in bits per second
    #[inline]
    pub fn rate(self) -> u32 {
        BAUD_RATES[self.0 as usize]
    }
}

/// Built-in demo programs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Demo {
    /// Basic room clean
    Cover = 0,
    /// Room clean, docking when the battery runs low
    CoverAndDock = 1,
    /// Spiral out and back in
    SpotCover = 2,
    /// Find a wall and follow it
    Mouse = 3,
    /// Continuous figure eight
    FigureEight = 4,
    /// Drive forward when pushed, away from bumps
    Wimp = 5,
    /// Home in on a virtual wall
    Home = 6,
    /// Home in on virtual walls one after another
    Tag = 7,
    /// Pachelbel's Canon on cliff sensor sequence
    Pachelbel = 8,
    /// Chords on cliff sensors and bumpers
    Banjo = 9,
    /// Abort the running demo
    Abort = 255,
}

impl Demo {
    /// Parse demo code from byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Demo::Cover),
            1 => Some(Demo::CoverAndDock),
            2 => Some(Demo::SpotCover),
            3 => Some(Demo::Mouse),
            4 => Some(Demo::FigureEight),
            5 => Some(Demo::Wimp),
            6 => Some(Demo::Home),
            7 => Some(Demo::Tag),
            8 => Some(Demo::Pachelbel),
            9 => Some(Demo::Banjo),
            255 => Some(Demo::Abort),
            _ => None,
        }
    }
}

/// Drive straight, curving slightly right
pub const RADIUS_STRAIGHT_RIGHT: i32 = 0x7fff;
/// Drive straight, curving slightly left
pub const RADIUS_STRAIGHT_LEFT: i32 = 0x8000;
/// Spin in place
pub const RADIUS_SPIN: i32 = 0xffff;

/// Wheel and drive speed limit (mm/s)
pub const MAX_SPEED: i32 = 500;
/// Turn radius limit for ordinary curves (mm)
pub const MAX_RADIUS: i32 = 2000;

/// Advance LED bit
pub const LED_ADVANCE: u8 = 0x08;
/// Play LED bit
pub const LED_PLAY: u8 = 0x02;

/// Longest wait expressible by the wait-time primitive (tenths of a second)
pub const MAX_WAIT_TENTHS: u8 = 255;

/// IR byte values
pub mod ir {
    /// No IR code received
    pub const NO_CODE: u8 = 255;

    pub const REMOTE_LEFT: u8 = 129;
    pub const REMOTE_FORWARD: u8 = 130;
    pub const REMOTE_RIGHT: u8 = 131;
    pub const REMOTE_SPOT: u8 = 132;
    pub const REMOTE_MAX: u8 = 133;
    pub const REMOTE_SMALL: u8 = 134;
    pub const REMOTE_MEDIUM: u8 = 135;
    pub const REMOTE_CLEAN: u8 = 136;
    pub const REMOTE_PAUSE: u8 = 137;
    pub const REMOTE_POWER: u8 = 138;
    pub const REMOTE_FORWARD_LEFT: u8 = 139;
    pub const REMOTE_FORWARD_RIGHT: u8 = 140;
    pub const REMOTE_STOP_DRIVING: u8 = 141;
    pub const REMOTE_SEND_ALL: u8 = 142;
    pub const REMOTE_SEEK_DOCK: u8 = 143;

    pub const HOME_BASE_RESERVED: u8 = 240;
    pub const HOME_BASE_FORCE_FIELD: u8 = 242;
    pub const HOME_BASE_GREEN: u8 = 244;
    pub const HOME_BASE_GREEN_FORCE_FIELD: u8 = 246;
    pub const HOME_BASE_RED: u8 = 248;
    pub const HOME_BASE_RED_FORCE_FIELD: u8 = 250;
    pub const HOME_BASE_RED_GREEN: u8 = 252;
    pub const HOME_BASE_RED_GREEN_FORCE_FIELD: u8 = 254;
}

// ============================================================================
// Sensor response
// ============================================================================

/// Answer to a Sensors request
///
/// ```text
/// ┌────┬─────────┬──────────────┬───────────┐
/// │ IR │ Buttons │ Distance i16 │ Angle i16 │
/// └────┴─────────┴──────────────┴───────────┘
/// ```
///
/// Distance (mm) and angle (degrees, positive counter-clockwise) accumulate
/// since the previous request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFrame {
    pub ir_code: u8,
    pub buttons: u8,
    pub distance_mm: i16,
    pub angle_deg: i16,
}

impl SensorFrame {
    /// Encoded frame length
    pub const LEN: usize = 6;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let d = self.distance_mm.to_be_bytes();
        let a = self.angle_deg.to_be_bytes();
        [self.ir_code, self.buttons, d[0], d[1], a[0], a[1]]
    }

    /// Parse a frame, `None` unless exactly [`SensorFrame::LEN`] bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::LEN {
            return None;
        }
        Some(Self {
            ir_code: bytes[0],
            buttons: bytes[1],
            distance_mm: i16::from_be_bytes([bytes[2], bytes[3]]),
            angle_deg: i16::from_be_bytes([bytes[4], bytes[5]]),
        })
    }

    /// IR byte, or `None` when no code has been received
    pub fn ir(&self) -> Option<u8> {
        (self.ir_code != ir::NO_CODE).then_some(self.ir_code)
    }
}

impl Default for SensorFrame {
    fn default() -> Self {
        Self {
            ir_code: ir::NO_CODE,
            buttons: 0,
            distance_mm: 0,
            angle_deg: 0,
        }
    }
}
