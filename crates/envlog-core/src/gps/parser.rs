// gps/parser.rs
use heapless::Vec;
use log::{debug, warn};

use super::sentence::SentenceKind;
use super::types::{FixState, Hemisphere};
use crate::time::{GpsDate, TimeOfDay};


/// Upper bound on fields kept from one sentence; the rest are ignored
const MAX_FIELDS: usize = 24;

/// Degree digits in front of the minutes of a latitude (`ddmm.mmmm`)
const LATITUDE_DEGREE_DIGITS: usize = 2;

/// Degree digits in front of the minutes of a longitude (`dddmm.mmmm`)
const LONGITUDE_DEGREE_DIGITS: usize = 3;

/// Split a sentence into fields, dropping the `*hh` checksum suffix.
///
/// Field 0 is the `$ttXXX` address.
pub fn split_fields(line: &str) -> Vec<&str, MAX_FIELDS> {
    let body = line.split_once('*').map_or(line, |(body, _)| body);
    body.split(',').take(MAX_FIELDS).collect()
}

/// Parse a GLL or RMC sentence into a fresh fix state.
///
/// Fields that cannot be parsed degrade to zero / indeterminate /
/// `00:00:00`; the sentence as a whole never fails. `Gsv` carries no fix
/// and yields `None`.
pub fn parse_fix(kind: SentenceKind, line: &str) -> Option<FixState> {
    let fields = split_fields(line);
    let field = |i: usize| fields.get(i).copied().unwrap_or("");

    // (lat, ns, lon, ew, time, status)
    let (lat, ns, lon, ew, time, status) = match kind {
        SentenceKind::Gll => (field(1), field(2), field(3), field(4), field(5), field(6)),
        SentenceKind::Rmc => (field(3), field(4), field(5), field(6), field(1), field(2)),
        SentenceKind::Gsv => return None,
    };

    let north_south = parse_hemisphere(ns, "N/S");
    let east_west = parse_hemisphere(ew, "E/W");
    let date = match kind {
        SentenceKind::Rmc => GpsDate::parse_nmea(field(9)),
        _ => None,
    };

    Some(FixState {
        latitude: parse_coordinate(lat, LATITUDE_DEGREE_DIGITS, "latitude") * north_south.sign(),
        longitude: parse_coordinate(lon, LONGITUDE_DEGREE_DIGITS, "longitude")
            * east_west.sign(),
        north_south,
        east_west,
        time: parse_time(time),
        date,
        fix_valid: status == "A",
    })
}

/// Satellites in view from a GSV sentence (field 3); 0 when missing or garbled.
pub fn parse_satellite_count(line: &str) -> u32 {
    let fields = split_fields(line);
    fields
        .get(3)
        .and_then(|count| count.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

/// Convert `[d]ddmm.mmmm` to decimal degrees.
///
/// The first `degree_digits` characters are whole degrees, the rest are
/// minutes. Anything shorter than `degree_digits + 1` characters is
/// unparseable and reads as 0.
pub fn parse_coordinate(token: &str, degree_digits: usize, name: &str) -> f64 {
    if token.is_empty() {
        debug!("GPS {} field empty", name);
        return 0.0;
    }

    if token.len() <= degree_digits {
        warn!("GPS {} token '{}' too short, using 0", name, token);
        return 0.0;
    }

    let parsed = token
        .get(..degree_digits)
        .zip(token.get(degree_digits..))
        .and_then(|(deg, min)| Some((deg.parse::<f64>().ok()?, min.parse::<f64>().ok()?)));

    match parsed {
        Some((degrees, minutes)) => degrees + minutes / 60.0,
        None => {
            warn!("GPS {} token '{}' is not numeric, using 0", name, token);
            0.0
        }
    }
}

fn parse_hemisphere(token: &str, name: &str) -> Hemisphere {
    let hemisphere = Hemisphere::from_token(token);
    if hemisphere == Hemisphere::Indeterminate && !token.is_empty() {
        warn!("GPS {} indicator '{}' not recognized", name, token);
    }
    hemisphere
}

fn parse_time(token: &str) -> TimeOfDay {
    match TimeOfDay::parse_nmea(token) {
        Some(time) => time,
        None => {
            if !token.is_empty() {
                warn!("GPS time token '{}' malformed, using 00:00:00", token);
            }
            TimeOfDay::MIDNIGHT
        }
    }
}
