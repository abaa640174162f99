//! Time sources and calendar helpers.
//!
//! The main loop measures intervals with a monotonic [`TimeSource`] and keeps
//! wall-clock seconds in a [`WallClock`] that the GPS corrects whenever it has
//! a valid fix.

use core::fmt::{self, Write as _};

use crate::config::DEFAULT_EPOCH;

const SECONDS_PER_DAY: u32 = 86_400;

/// Monotonic millisecond clock.
pub trait TimeSource: Clone {
    /// Milliseconds since boot
    fn now_ms(&self) -> u64;

    /// Milliseconds elapsed since `reference_ms`, saturating at zero
    fn elapsed_since(&self, reference_ms: u64) -> u64 {
        self.now_ms().saturating_sub(reference_ms)
    }
}

/// Firmware clock backed by the embassy time driver
#[cfg(feature = "embassy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy")]
impl TimeSource for EmbassyClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}

#[cfg(feature = "embassy")]
impl embedded_hal::delay::DelayNs for EmbassyClock {
    fn delay_ns(&mut self, ns: u32) {
        embassy_time::block_for(embassy_time::Duration::from_nanos(ns as u64));
    }
}

/// UTC time of day as reported by the GPS (`HHMMSS[.sss]`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeOfDay {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self {
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    /// Parse an NMEA time token. Needs at least six leading digits in range.
    pub fn parse_nmea(token: &str) -> Option<Self> {
        let digits = token.as_bytes().get(..6)?;
        let hours = two_digits(&digits[0..2])?;
        let minutes = two_digits(&digits[2..4])?;
        let seconds = two_digits(&digits[4..6])?;

        // 60 is a valid leap second
        if hours > 23 || minutes > 59 || seconds > 60 {
            return None;
        }

        Some(Self {
            hours,
            minutes,
            seconds,
        })
    }

    pub fn seconds_of_day(&self) -> u32 {
        self.hours as u32 * 3600 + self.minutes as u32 * 60 + self.seconds as u32
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// UTC calendar date from an RMC sentence (`ddmmyy`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpsDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl GpsDate {
    /// Parse an NMEA date token. Two-digit years map to 2000..2099.
    pub fn parse_nmea(token: &str) -> Option<Self> {
        if token.len() != 6 {
            return None;
        }
        let digits = token.as_bytes();
        let day = two_digits(&digits[0..2])?;
        let month = two_digits(&digits[2..4])?;
        let year = 2000 + two_digits(&digits[4..6])? as u16;

        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }

        Some(Self { year, month, day })
    }

    /// Days since 1970-01-01
    pub fn days_since_epoch(&self) -> i64 {
        days_from_civil(self.year as i64, self.month as u32, self.day as u32)
    }

    /// Unix seconds for this date at `time`
    pub fn to_epoch(&self, time: TimeOfDay) -> u32 {
        let days = self.days_since_epoch().max(0) as u32;
        days * SECONDS_PER_DAY + time.seconds_of_day()
    }
}

/// Wall-clock seconds derived from the monotonic clock plus the last sync point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallClock {
    base_epoch: u32,
    base_ms: u64,
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCH, 0)
    }
}

impl WallClock {
    pub fn new(epoch: u32, now_ms: u64) -> Self {
        Self {
            base_epoch: epoch,
            base_ms: now_ms,
        }
    }

    pub fn now_epoch(&self, now_ms: u64) -> u32 {
        let elapsed = (now_ms.saturating_sub(self.base_ms) / 1000) as u32;
        self.base_epoch.saturating_add(elapsed)
    }

    pub fn set(&mut self, epoch: u32, now_ms: u64) {
        self.base_epoch = epoch;
        self.base_ms = now_ms;
    }

    /// Replace the time of day while keeping the current date.
    pub fn apply_time_of_day(&mut self, time: TimeOfDay, now_ms: u64) {
        let now = self.now_epoch(now_ms);
        let midnight = now - now % SECONDS_PER_DAY;
        self.set(midnight + time.seconds_of_day(), now_ms);
    }

    /// Correct the clock from GPS data.
    ///
    /// A `00:00:00` time is what the parser reports for a missing field, so it
    /// is ignored; with a date the clock is set outright, without one only the
    /// time of day changes. Returns whether the clock changed.
    pub fn sync(&mut self, date: Option<GpsDate>, time: TimeOfDay, now_ms: u64) -> bool {
        if time == TimeOfDay::MIDNIGHT {
            return false;
        }
        match date {
            Some(date) => self.set(date.to_epoch(time), now_ms),
            None => self.apply_time_of_day(time, now_ms),
        }
        true
    }
}

/// Format Unix seconds as `YYYY-MM-DD HH:MM:SS+00:00`.
pub fn format_measured_at(epoch: u32) -> heapless::String<32> {
    let days = (epoch / SECONDS_PER_DAY) as i64;
    let secs = epoch % SECONDS_PER_DAY;
    let (year, month, day) = civil_from_days(days);

    let mut out = heapless::String::new();
    // 25 characters always fit
    let _ = write!(
        out,
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}+00:00",
        year,
        month,
        day,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    );
    out
}

fn two_digits(bytes: &[u8]) -> Option<u8> {
    match bytes {
        [a, b] if a.is_ascii_digit() && b.is_ascii_digit() => Some((a - b'0') * 10 + (b - b'0')),
        _ => None,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = (if year >= 0 { year } else { year - 399 }) / 400;
    let yoe = year - era * 400;
    let mp = (month as i64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of [`days_from_civil`]
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}
