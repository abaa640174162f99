//! NMEA line assembly and sentence classification.

use crate::config::GPS_MAX_LINE_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Waiting for a `$`
    Idle,
    AccumulatingLine,
}

/// What a single byte did to the line buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEvent {
    Pending,
    /// A full line is available through [`LineReader::line`]
    Complete,
    /// The line grew past the limit and was discarded
    Overflow,
}

/// Sentence types the receiver understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceKind {
    /// Position, time, status
    Gll,
    /// Time, status, position, speed, course, date
    Rmc,
    /// Satellites in view
    Gsv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    Valid,
    Missing,
    Mismatch,
}

/// Byte-at-a-time NMEA line assembler.
///
/// Bytes before the first `$` are noise and dropped. A `$` in the middle of a
/// line starts over, since it means the previous sentence was cut off.
#[derive(Debug)]
pub struct LineReader {
    buf: heapless::Vec<u8, GPS_MAX_LINE_LEN>,
    state: ReaderState,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            state: ReaderState::Idle,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn push(&mut self, byte: u8) -> LineEvent {
        match (byte, self.state) {
            (b'$', _) => {
                self.buf.clear();
                // Cannot fail on an empty buffer
                let _ = self.buf.push(byte);
                self.state = ReaderState::AccumulatingLine;
                LineEvent::Pending
            }
            (_, ReaderState::Idle) | (b'\r', _) => LineEvent::Pending,
            (b'\n', ReaderState::AccumulatingLine) => {
                self.state = ReaderState::Idle;
                LineEvent::Complete
            }
            (_, ReaderState::AccumulatingLine) => {
                if self.buf.push(byte).is_err() {
                    self.clear();
                    return LineEvent::Overflow;
                }
                LineEvent::Pending
            }
        }
    }

    /// The completed line without its terminator; empty if it is not UTF-8
    pub fn line(&self) -> &str {
        core::str::from_utf8(&self.buf).unwrap_or("")
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.state = ReaderState::Idle;
    }
}

/// XOR of every byte, as used between `$` and `*`
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, &b| acc ^ b)
}

/// Check the `*hh` suffix of a line, if it has one.
pub fn verify_checksum(line: &str) -> ChecksumStatus {
    let Some(body) = line.strip_prefix('$') else {
        return ChecksumStatus::Mismatch;
    };
    let Some((payload, suffix)) = body.split_once('*') else {
        return ChecksumStatus::Missing;
    };

    let provided = suffix
        .get(..2)
        .and_then(|hex| u8::from_str_radix(hex, 16).ok());
    match provided {
        Some(value) if value == checksum(payload.as_bytes()) => ChecksumStatus::Valid,
        _ => ChecksumStatus::Mismatch,
    }
}

/// Identify `$ttGLL`, `$ttRMC` and `$ttGSV` for any two-letter talker.
pub fn classify(line: &str) -> Option<SentenceKind> {
    let bytes = line.as_bytes();
    if bytes.len() < 6 || bytes[0] != b'$' || !bytes[1..3].iter().all(u8::is_ascii_uppercase) {
        return None;
    }
    // The type must be followed by a field separator (or end the line)
    if bytes.get(6).is_some_and(|&b| b != b',' && b != b'*') {
        return None;
    }

    match &bytes[3..6] {
        b"GLL" => Some(SentenceKind::Gll),
        b"RMC" => Some(SentenceKind::Rmc),
        b"GSV" => Some(SentenceKind::Gsv),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(reader: &mut LineReader, bytes: &[u8]) -> LineEvent {
        let mut last = LineEvent::Pending;
        for &b in bytes {
            last = reader.push(b);
            if last != LineEvent::Pending {
                break;
            }
        }
        last
    }

    #[test]
    fn test_assembles_line_and_strips_terminator() {
        let mut reader = LineReader::new();
        assert_eq!(
            feed(&mut reader, b"noise$GPGLL,4812.3456,N*00\r\n"),
            LineEvent::Complete
        );
        assert_eq!(reader.line(), "$GPGLL,4812.3456,N*00");
        assert_eq!(reader.state(), ReaderState::Idle);
    }

    #[test]
    fn test_dollar_restarts_cut_off_sentence() {
        let mut reader = LineReader::new();
        assert_eq!(
            feed(&mut reader, b"$GPRMC,1235$GNGLL,,,,,,V\n"),
            LineEvent::Complete
        );
        assert_eq!(reader.line(), "$GNGLL,,,,,,V");
    }

    #[test]
    fn test_overflow_resets_buffer() {
        let mut reader = LineReader::new();
        let mut long = alloc::vec![b'$'];
        long.extend(core::iter::repeat_n(b'A', GPS_MAX_LINE_LEN));
        assert_eq!(feed(&mut reader, &long), LineEvent::Overflow);
        assert_eq!(reader.state(), ReaderState::Idle);

        // Remaining bytes of the long line are ignored until the next '$'
        assert_eq!(feed(&mut reader, b"AAAA\n"), LineEvent::Pending);
        assert_eq!(feed(&mut reader, b"$GPGSV,1,1,00\n"), LineEvent::Complete);
    }

    #[test]
    fn test_checksum_verification() {
        let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
        assert_eq!(verify_checksum(line), ChecksumStatus::Valid);

        let tampered = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6B";
        assert_eq!(verify_checksum(tampered), ChecksumStatus::Mismatch);
        assert_eq!(verify_checksum("$GPRMC,123519,A*"), ChecksumStatus::Mismatch);
        assert_eq!(verify_checksum("$GPRMC,123519,A"), ChecksumStatus::Missing);
    }

    #[test]
    fn test_classify_is_talker_agnostic() {
        assert_eq!(classify("$GPGLL,1,N"), Some(SentenceKind::Gll));
        assert_eq!(classify("$GNRMC,1,A"), Some(SentenceKind::Rmc));
        assert_eq!(classify("$GLGSV,1,1,05"), Some(SentenceKind::Gsv));
        assert_eq!(classify("$GPGGA,123519"), None);
        assert_eq!(classify("$GPRMCX,1"), None);
        assert_eq!(classify("GPRMC,1"), None);
        assert_eq!(classify("$PMTK001,101,3"), None);
    }
}
