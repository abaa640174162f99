use thiserror_no_std::Error;

use crate::time::{GpsDate, TimeOfDay};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsError {
    #[error("No fix sentence received within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("Serial channel error: {0:?}")]
    Serial(embedded_io::ErrorKind),
    #[error("GPS module did not respond to {command}")]
    ModuleUnresponsive { command: &'static str },
}

/// Hemisphere indicator of a coordinate field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
    /// Field missing or unrecognized; never defaults to a real hemisphere
    #[default]
    Indeterminate,
}

impl Hemisphere {
    pub fn from_token(token: &str) -> Self {
        match token {
            "N" => Self::North,
            "S" => Self::South,
            "E" => Self::East,
            "W" => Self::West,
            _ => Self::Indeterminate,
        }
    }

    /// Single-character form used on the status page (`C` when indeterminate)
    pub fn as_char(self) -> char {
        match self {
            Self::North => 'N',
            Self::South => 'S',
            Self::East => 'E',
            Self::West => 'W',
            Self::Indeterminate => 'C',
        }
    }

    pub(crate) fn sign(self) -> f64 {
        match self {
            Self::South | Self::West => -1.0,
            _ => 1.0,
        }
    }
}

/// Last parsed GPS state.
///
/// Coordinates are signed decimal degrees (south and west negative). A field
/// that could not be parsed is zero, and `time` reads `00:00:00` when absent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FixState {
    pub latitude: f64,
    pub longitude: f64,
    pub north_south: Hemisphere,
    pub east_west: Hemisphere,
    pub time: TimeOfDay,
    /// Only RMC sentences carry a date
    pub date: Option<GpsDate>,
    pub fix_valid: bool,
}

impl FixState {
    /// `(latitude, longitude)` when the fix is valid
    pub fn position(&self) -> Option<(f64, f64)> {
        self.fix_valid.then_some((self.latitude, self.longitude))
    }
}

/// A fix sentence was obtained; whether it reports an active fix is the variant.
///
/// Together with [`GpsError::Timeout`] this is the three-way result of a read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadOutcome {
    Fix(FixState),
    NoFix(FixState),
}

impl ReadOutcome {
    pub fn state(&self) -> &FixState {
        match self {
            Self::Fix(state) | Self::NoFix(state) => state,
        }
    }

    pub fn is_fix(&self) -> bool {
        matches!(self, Self::Fix(_))
    }
}

/// Line counters for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReaderStats {
    pub lines: u32,
    pub unsupported: u32,
    pub checksum_errors: u32,
    pub overflows: u32,
    pub timeouts: u32,
}
