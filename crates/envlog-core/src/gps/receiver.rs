//! GPS receiver driver on top of a byte-oriented serial channel.

use embedded_hal::delay::DelayNs;
use embedded_io::{Read, ReadReady, Write};
use log::{debug, info, warn};

use super::commands::{
    COLD_START, ENABLE_TIME_MESSAGES, HOT_START, StartSequence, WARM_START, frame_command,
};
use super::parser::{parse_fix, parse_satellite_count};
use super::sentence::{ChecksumStatus, LineEvent, LineReader, SentenceKind, classify, verify_checksum};
use super::types::{FixState, GpsError, ReadOutcome, ReaderStats};
use crate::config::{
    GPS_FIX_RETRY_DELAY_MS, GPS_MAX_LINE_LEN, GPS_READ_TIMEOUT_MS, GPS_SATELLITE_POLL_MS,
};
use crate::time::TimeSource;

/// Delay between polls of an idle serial channel
const IDLE_POLL_MS: u32 = 1;

/// NMEA GPS module on a serial channel.
///
/// All reads have an explicit deadline measured from the start of the call,
/// so the main loop is never blocked by a silent module. The last parsed fix
/// survives timeouts and serial errors.
pub struct Gps<U, C> {
    serial: U,
    clock: C,
    reader: LineReader,
    last_fix: FixState,
    stats: ReaderStats,
}

impl<U, C> Gps<U, C>
where
    U: Read + ReadReady + Write,
    C: TimeSource + DelayNs,
{
    pub fn new(serial: U, clock: C) -> Self {
        Self {
            serial,
            clock,
            reader: LineReader::new(),
            last_fix: FixState::default(),
            stats: ReaderStats::default(),
        }
    }

    /// Fix state from the last GLL/RMC sentence parsed
    pub fn last_known_fix(&self) -> &FixState {
        &self.last_fix
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Read until a GLL or RMC sentence arrives or `timeout_ms` elapses.
    ///
    /// Unsupported and corrupt lines are skipped without extending the
    /// deadline. On timeout the last known fix is left untouched.
    pub fn read_line(&mut self, timeout_ms: u64) -> Result<ReadOutcome, GpsError> {
        let fix = self.read_matching(timeout_ms, |kind, line| match kind {
            SentenceKind::Gll | SentenceKind::Rmc => parse_fix(kind, line),
            SentenceKind::Gsv => None,
        })?;

        self.last_fix = fix;
        if fix.fix_valid {
            Ok(ReadOutcome::Fix(fix))
        } else {
            Ok(ReadOutcome::NoFix(fix))
        }
    }

    /// Satellites in view from the next GSV sentence.
    ///
    /// Returns 0 both when no satellites are visible and when no GSV sentence
    /// arrived in time. GLL/RMC sentences passing by during the scan still
    /// update the last known fix.
    pub fn visible_satellites(&mut self, timeout_ms: u64) -> u32 {
        let mut passing_fix = None;
        let result = self.read_matching(timeout_ms, |kind, line| match kind {
            SentenceKind::Gsv => Some(parse_satellite_count(line)),
            SentenceKind::Gll | SentenceKind::Rmc => {
                if let Some(fix) = parse_fix(kind, line) {
                    passing_fix = Some(fix);
                }
                None
            }
        });

        if let Some(fix) = passing_fix {
            self.last_fix = fix;
        }

        match result {
            Ok(count) => count,
            Err(e) => {
                debug!("Satellite count unavailable: {}", e);
                0
            }
        }
    }

    /// Keep reading until a valid fix or `timeout_ms` elapses.
    ///
    /// The satellite count is logged every few seconds while waiting.
    pub fn wait_for_fix(&mut self, timeout_ms: u64) -> bool {
        info!("Waiting for GPS fix (timeout: {} ms)", timeout_ms);
        let start = self.clock.now_ms();
        let mut last_satellite_poll = start;

        loop {
            let elapsed = self.clock.elapsed_since(start);
            if elapsed >= timeout_ms {
                warn!("Timeout waiting for GPS fix");
                return false;
            }

            let budget = (timeout_ms - elapsed).min(GPS_READ_TIMEOUT_MS);
            match self.read_line(budget) {
                Ok(ReadOutcome::Fix(fix)) => {
                    info!(
                        "GPS fix acquired: {:.6}{} {:.6}{} at {}",
                        fix.latitude,
                        fix.north_south.as_char(),
                        fix.longitude,
                        fix.east_west.as_char(),
                        fix.time
                    );
                    return true;
                }
                Ok(ReadOutcome::NoFix(_)) | Err(GpsError::Timeout { .. }) => {}
                Err(e) => warn!("GPS read failed while waiting for fix: {}", e),
            }

            if self.clock.elapsed_since(last_satellite_poll) >= GPS_SATELLITE_POLL_MS {
                let remaining = timeout_ms.saturating_sub(self.clock.elapsed_since(start));
                let satellites = self.visible_satellites(remaining.min(GPS_READ_TIMEOUT_MS));
                info!(
                    "Still waiting for fix: {} satellites in view, {} ms left",
                    satellites, remaining
                );
                last_satellite_poll = self.clock.now_ms();
            }

            self.clock.delay_ms(GPS_FIX_RETRY_DELAY_MS);
        }
    }

    pub fn hot_start(&mut self) -> Result<(), GpsError> {
        self.run_sequence(&HOT_START)
    }

    pub fn warm_start(&mut self) -> Result<(), GpsError> {
        self.run_sequence(&WARM_START)
    }

    /// Cold start, then re-enable the time-carrying sentences.
    pub fn cold_start(&mut self) -> Result<(), GpsError> {
        let restarted = self.run_sequence(&COLD_START);
        if let Err(e) = self.enable_time_messages() {
            warn!("GPS did not confirm time messages after cold start: {}", e);
        }
        restarted
    }

    pub fn enable_time_messages(&mut self) -> Result<(), GpsError> {
        self.run_sequence(&ENABLE_TIME_MESSAGES)
    }

    /// True if any byte arrives within `timeout_ms`.
    pub fn test_connection(&mut self, timeout_ms: u64) -> bool {
        let start = self.clock.now_ms();
        matches!(self.poll_byte(start, timeout_ms), Ok(Some(_)))
    }

    pub fn release(self) -> (U, C) {
        (self.serial, self.clock)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Assemble lines until `accept` returns a value for one of them.
    fn read_matching<T>(
        &mut self,
        timeout_ms: u64,
        mut accept: impl FnMut(SentenceKind, &str) -> Option<T>,
    ) -> Result<T, GpsError> {
        let start = self.clock.now_ms();

        loop {
            let Some(byte) = self.poll_byte(start, timeout_ms)? else {
                self.stats.timeouts += 1;
                return Err(GpsError::Timeout { timeout_ms });
            };

            match self.reader.push(byte) {
                LineEvent::Pending => continue,
                LineEvent::Overflow => {
                    self.stats.overflows += 1;
                    warn!("GPS line longer than {} bytes discarded", GPS_MAX_LINE_LEN);
                    continue;
                }
                LineEvent::Complete => {}
            }

            let line = self.reader.line();
            self.stats.lines += 1;

            let accepted = match (verify_checksum(line), classify(line)) {
                (ChecksumStatus::Mismatch, _) => {
                    self.stats.checksum_errors += 1;
                    debug!("Discarding GPS line with bad checksum: {}", line);
                    None
                }
                (_, None) => {
                    self.stats.unsupported += 1;
                    debug!("Skipping unsupported sentence: {}", line);
                    None
                }
                (_, Some(kind)) => accept(kind, line),
            };

            self.reader.clear();
            if let Some(value) = accepted {
                return Ok(value);
            }
        }
    }

    /// Next byte, or `None` once `timeout_ms` has passed since `start`.
    fn poll_byte(&mut self, start: u64, timeout_ms: u64) -> Result<Option<u8>, GpsError> {
        loop {
            if self.clock.elapsed_since(start) >= timeout_ms {
                return Ok(None);
            }

            if self.serial.read_ready().map_err(serial_error)? {
                let mut byte = [0u8; 1];
                if self.serial.read(&mut byte).map_err(serial_error)? == 1 {
                    return Ok(Some(byte[0]));
                }
            }

            self.clock.delay_ms(IDLE_POLL_MS);
        }
    }

    fn send(&mut self, body: &str) -> Result<(), GpsError> {
        let frame = frame_command(body);
        debug!("GPS <- {}", frame.trim_end());
        self.serial
            .write_all(frame.as_bytes())
            .map_err(serial_error)?;
        self.serial.flush().map_err(serial_error)
    }

    /// Send every step of `sequence`, then look for any sign of life.
    fn run_sequence(&mut self, sequence: &StartSequence) -> Result<(), GpsError> {
        info!("Sending GPS {} sequence", sequence.name);

        for step in sequence.steps {
            self.send(step.body)?;
            self.clock.delay_ms(step.settle_ms);
        }

        for _ in 0..sequence.polls {
            self.clock.delay_ms(sequence.poll_interval_ms);
            if self.serial.read_ready().map_err(serial_error)? {
                info!("GPS module responded after {}", sequence.name);
                if sequence.drain_after {
                    self.drain()?;
                }
                return Ok(());
            }
        }

        warn!("No response from GPS module after {}", sequence.name);
        Err(GpsError::ModuleUnresponsive {
            command: sequence.name,
        })
    }

    /// Discard everything currently buffered, including a partial line.
    fn drain(&mut self) -> Result<(), GpsError> {
        let mut scratch = [0u8; 32];
        while self.serial.read_ready().map_err(serial_error)? {
            if self.serial.read(&mut scratch).map_err(serial_error)? == 0 {
                break;
            }
        }
        self.reader.clear();
        Ok(())
    }
}

fn serial_error<E: embedded_io::Error>(e: E) -> GpsError {
    GpsError::Serial(e.kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::Hemisphere;
    use crate::mock::{ScriptedSerial, SimClock};

    const FIX_RMC: &str = "$GPRMC,123519,A,4812.3456,N,01637.7890,E,0.0,0.0,010224,,*1B";
    const FIX_GLL: &str = "$GNGLL,4812.3456,N,01637.7890,E,123519,A,A*5A";
    const GSV: &str = "$GPGSV,3,1,11,03,03,111,00,04,15,270,00,06,01,010,00,13,06,292,00*74";

    fn gps() -> (ScriptedSerial, SimClock, Gps<ScriptedSerial, SimClock>) {
        let serial = ScriptedSerial::new();
        let clock = SimClock::new();
        let gps = Gps::new(serial.clone(), clock.clone());
        (serial, clock, gps)
    }

    #[test]
    fn test_read_line_returns_valid_fix() {
        let (serial, _clock, mut gps) = gps();
        serial.push_line(FIX_RMC);

        let outcome = gps.read_line(2_000).unwrap();
        assert!(outcome.is_fix());
        assert_eq!(outcome.state().north_south, Hemisphere::North);
        assert_eq!(gps.last_known_fix(), outcome.state());
    }

    #[test]
    fn test_invalid_status_is_distinct_outcome() {
        let (serial, _clock, mut gps) = gps();
        serial.push_line("$GPGLL,4812.3456,N,01637.7890,E,123519,V");

        let outcome = gps.read_line(2_000).unwrap();
        assert!(matches!(outcome, ReadOutcome::NoFix(_)));
        assert!(!gps.last_known_fix().fix_valid);
    }

    #[test]
    fn test_unsupported_lines_are_skipped() {
        let (serial, clock, mut gps) = gps();
        serial.push_line("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47");
        serial.push_line("$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K");
        serial.push_line(GSV);
        serial.push_line(FIX_GLL);

        assert!(gps.read_line(2_000).unwrap().is_fix());
        assert_eq!(gps.stats().unsupported, 2);
        assert_eq!(gps.stats().lines, 4);
        // Bytes were waiting the whole time, so no idle polling happened
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn test_bad_checksum_line_is_discarded() {
        let (serial, _clock, mut gps) = gps();
        serial.push_line("$GPRMC,123519,A,4812.3456,N,01637.7890,E,0.0,0.0,010224,,*1C");
        serial.push_line("$GPRMC,000001,V,,,,,,,010224,,");

        let outcome = gps.read_line(2_000).unwrap();
        assert!(!outcome.is_fix());
        assert_eq!(gps.stats().checksum_errors, 1);
    }

    #[test]
    fn test_timeout_keeps_last_known_fix() {
        let (serial, clock, mut gps) = gps();
        serial.push_line(FIX_RMC);
        let known = *gps.read_line(2_000).unwrap().state();

        // Partial sentence with no terminator
        serial.push_rx(b"$GPRMC,123520,V,,,");
        let started = clock.now_ms();
        assert_eq!(
            gps.read_line(2_000),
            Err(GpsError::Timeout { timeout_ms: 2_000 })
        );
        assert_eq!(clock.now_ms() - started, 2_000);
        assert_eq!(*gps.last_known_fix(), known);
        assert_eq!(gps.stats().timeouts, 1);
    }

    #[test]
    fn test_line_completes_across_calls() {
        let (serial, _clock, mut gps) = gps();
        serial.push_rx(b"$GNGLL,4812.3456,N,016");
        assert!(gps.read_line(10).is_err());

        serial.push_rx(b"37.7890,E,123519,A,A*5A\r\n");
        assert!(gps.read_line(10).unwrap().is_fix());
    }

    #[test]
    fn test_overflow_then_recover() {
        let (serial, _clock, mut gps) = gps();
        let mut junk = alloc::string::String::from("$GP");
        junk.extend(core::iter::repeat_n('X', 250));
        serial.push_line(&junk);
        serial.push_line(FIX_GLL);

        assert!(gps.read_line(2_000).unwrap().is_fix());
        assert_eq!(gps.stats().overflows, 1);
    }

    #[test]
    fn test_visible_satellites() {
        let (serial, _clock, mut gps) = gps();
        serial.push_line(FIX_GLL);
        serial.push_line(GSV);
        assert_eq!(gps.visible_satellites(2_000), 11);

        // Nothing more on the wire: unknown reads as zero
        assert_eq!(gps.visible_satellites(500), 0);
    }

    #[test]
    fn test_satellite_scan_keeps_passing_fix() {
        let (serial, _clock, mut gps) = gps();
        serial.push_line(FIX_RMC);
        serial.push_line(GSV);
        assert_eq!(gps.visible_satellites(2_000), 11);
        assert!(gps.last_known_fix().fix_valid);
        assert_eq!(gps.last_known_fix().north_south, Hemisphere::North);

        // A lost fix seen before the scan times out is recorded as well
        serial.push_line("$GPGLL,,,,,123600,V");
        assert_eq!(gps.visible_satellites(500), 0);
        assert!(!gps.last_known_fix().fix_valid);
    }

    #[test]
    fn test_wait_for_fix_polls_until_valid() {
        let (serial, clock, mut gps) = gps();
        serial.push_line("$GPGLL,,,,,123519,V");
        serial.push_line("$GPGLL,,,,,123520,V");
        serial.push_line(FIX_GLL);

        assert!(gps.wait_for_fix(30_000));
        // Two retries with a 200 ms pause each
        assert_eq!(clock.now_ms(), 400);
    }

    #[test]
    fn test_wait_for_fix_gives_up_at_deadline() {
        let (_serial, clock, mut gps) = gps();
        assert!(!gps.wait_for_fix(12_000));
        assert!(clock.now_ms() >= 12_000);
        assert!(clock.now_ms() < 12_000 + 2 * GPS_READ_TIMEOUT_MS);
    }

    #[test]
    fn test_hot_start_sends_sequence_and_drains() {
        let (serial, _clock, mut gps) = gps();
        serial.set_auto_reply(Some(b"$PMTK001,101,3*30\r\n"));

        gps.hot_start().unwrap();
        let written = serial.written();
        assert!(written.starts_with("$PMTK101*32\r\n"));
        assert!(written.contains("$PMTK314,0,1,0,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0*28\r\n"));
        assert!(written.contains("$PUBX,40,GLL,0,1,0,0,0,0*5D\r\n"));
        assert!(written.ends_with("$PUBX,40,RMC,0,1,0,0,0,0*46\r\n"));
        assert_eq!(serial.pending_rx(), 0);
    }

    #[test]
    fn test_unresponsive_module_is_reported() {
        let (serial, clock, mut gps) = gps();
        assert_eq!(
            gps.warm_start(),
            Err(GpsError::ModuleUnresponsive {
                command: "warm start"
            })
        );
        assert_eq!(serial.written(), "$PMTK102*31\r\n");
        // 500 ms settle plus 10 polls of 100 ms
        assert_eq!(clock.now_ms(), 1_500);
    }

    #[test]
    fn test_cold_start_enables_time_messages() {
        let (serial, _clock, mut gps) = gps();
        serial.set_auto_reply(Some(b"$PMTK001,103,3*32\r\n"));

        gps.cold_start().unwrap();
        let written = serial.written();
        assert!(written.starts_with("$PMTK103*30\r\n$PUBX,104*06\r\n"));
        assert!(written.contains("$PSRF100,1,9600,8,1,0*0D\r\n"));
    }

    #[test]
    fn test_connection_check() {
        let (serial, _clock, mut gps) = gps();
        assert!(!gps.test_connection(100));
        serial.push_rx(b"$");
        assert!(gps.test_connection(100));
    }
}
