//! Vendor configuration commands for NMEA GPS modules.
//!
//! The same sequences are sent regardless of chipset: MTK (`PMTK`), u-blox
//! (`PUBX`) and SiRF (`PSRF`) modules each ignore the sentences meant for the
//! others. Checksums are computed when the command is framed.

use core::fmt::Write as _;

use super::sentence::checksum;

/// One command body (without `$`, checksum or line ending) and the time the
/// module gets to digest it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStep {
    pub body: &'static str,
    pub settle_ms: u32,
}

/// A restart/configuration sequence and how long to wait for the module to talk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartSequence {
    pub name: &'static str,
    pub steps: &'static [CommandStep],
    /// Number of "any byte received?" checks after the last step
    pub polls: u32,
    pub poll_interval_ms: u32,
    /// Discard whatever the module sent once it answered
    pub drain_after: bool,
}

const fn step(body: &'static str, settle_ms: u32) -> CommandStep {
    CommandStep { body, settle_ms }
}

/// Restart using all retained data; also re-enables GLL/RMC output
pub const HOT_START: StartSequence = StartSequence {
    name: "hot start",
    steps: &[
        step("PMTK101", 500),
        step("PMTK314,0,1,0,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0", 200),
        step("PUBX,40,GLL,0,1,0,0,0,0", 200),
        step("PUBX,40,RMC,0,1,0,0,0,0", 500),
    ],
    polls: 10,
    poll_interval_ms: 100,
    drain_after: true,
};

/// Restart keeping almanac and time, dropping ephemeris
pub const WARM_START: StartSequence = StartSequence {
    name: "warm start",
    steps: &[step("PMTK102", 500)],
    polls: 10,
    poll_interval_ms: 100,
    drain_after: false,
};

/// Restart from scratch; enables GLL/RMC/GSV output afterwards
pub const COLD_START: StartSequence = StartSequence {
    name: "cold start",
    steps: &[
        step("PMTK103", 1000),
        step("PUBX,104", 1000),
        step("PMTK314,0,1,0,1,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0", 500),
    ],
    polls: 20,
    poll_interval_ms: 200,
    drain_after: true,
};

/// Turn on the sentences carrying time (GLL, RMC, VTG, GGA, GSA, GSV)
pub const ENABLE_TIME_MESSAGES: StartSequence = StartSequence {
    name: "enable time messages",
    steps: &[
        step("PMTK314,1,1,1,1,1,1,0,0,0,0,0,0,0,0,0,0,0,0,0", 200),
        step("PUBX,40,GLL,0,1,0,0,0,0", 200),
        step("PSRF100,1,9600,8,1,0", 500),
    ],
    polls: 30,
    poll_interval_ms: 100,
    drain_after: false,
};

/// Frame a command body as `$BODY*HH\r\n`.
pub fn frame_command(body: &str) -> heapless::String<96> {
    let mut out = heapless::String::new();
    // Bodies are short compile-time constants
    let _ = write!(out, "${}*{:02X}\r\n", body, checksum(body.as_bytes()));
    out
}
