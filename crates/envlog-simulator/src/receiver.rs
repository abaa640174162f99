//! Simulated NMEA GPS module.
//!
//! Emits one RMC/GLL/GSV burst per virtual second, paced by the shared
//! [`SimClock`]. The module runs through a scripted life:
//!
//! | Virtual time      | Behaviour                                 |
//! |-------------------|-------------------------------------------|
//! | 0 .. 45 s         | warm-up, sentences without a fix          |
//! | 45 s .. 5 min     | valid fix, slowly walking position        |
//! | 5 min .. 6.5 min  | lost fix (status `V`, empty coordinates)  |
//! | 6.5 min .. 8 min  | silent, not even command acknowledgements |
//! | 8 min ..          | valid fix again                           |

use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt::Write as _;

use embedded_io::{ErrorType, Read, ReadReady, Write};
use envlog_core::gps::commands::frame_command;
use envlog_core::mock::SimClock;
use envlog_core::time::TimeSource;
use log::{debug, trace};

/// Bytes a real UART FIFO plus driver ring buffer would hold
const RX_BUFFER_LIMIT: usize = 2048;

const WARM_UP_END_S: u64 = 45;
const DROPOUT_START_S: u64 = 5 * 60;
const SILENCE_START_S: u64 = 6 * 60 + 30;
const SILENCE_END_S: u64 = 8 * 60;

/// UTC time of day and date the simulated run starts at
const START_SECONDS_OF_DAY: u64 = 8 * 3600;
const START_DATE: &str = "140624";

/// Starting point of the walk (Vienna, Stephansplatz)
const ORIGIN_LATITUDE: f64 = 48.208_493;
const ORIGIN_LONGITUDE: f64 = 16.373_091;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WarmUp,
    Fix,
    Dropout,
    Silent,
}

fn phase_at(second: u64) -> Phase {
    match second {
        s if s < WARM_UP_END_S => Phase::WarmUp,
        s if s < DROPOUT_START_S => Phase::Fix,
        s if s < SILENCE_START_S => Phase::Dropout,
        s if s < SILENCE_END_S => Phase::Silent,
        _ => Phase::Fix,
    }
}

/// Serial side of the simulated module
pub struct SimulatedReceiver {
    clock: SimClock,
    rx: VecDeque<u8>,
    /// Virtual second of the next burst
    next_second: u64,
    dropped_bursts: u32,
}

impl SimulatedReceiver {
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            rx: VecDeque::new(),
            next_second: 0,
            dropped_bursts: 0,
        }
    }

    fn current_phase(&self) -> Phase {
        phase_at(self.clock.now_ms() / 1000)
    }

    /// Queue every burst that is due by now.
    fn catch_up(&mut self) {
        let now_s = self.clock.now_ms() / 1000;
        while self.next_second <= now_s {
            let second = self.next_second;
            self.next_second += 1;

            if phase_at(second) == Phase::Silent {
                continue;
            }
            if self.rx.len() > RX_BUFFER_LIMIT {
                self.dropped_bursts += 1;
                trace!("RX buffer full, burst {} dropped ({} so far)", second, self.dropped_bursts);
                continue;
            }
            self.queue_burst(second);
        }
    }

    fn queue_burst(&mut self, second: u64) {
        let phase = phase_at(second);
        let time = nmea_time(START_SECONDS_OF_DAY + second);
        let (lat, ns, lon, ew, status) = match phase {
            Phase::Fix => {
                let (latitude, longitude) = position_at(second);
                (
                    nmea_coordinate(latitude, 2),
                    "N",
                    nmea_coordinate(longitude, 3),
                    "E",
                    "A",
                )
            }
            _ => (String::new(), "", String::new(), "", "V"),
        };

        let mut body = String::new();
        let _ = write!(
            body,
            "GPRMC,{time},{status},{lat},{ns},{lon},{ew},0.4,87.2,{START_DATE},,"
        );
        self.queue_sentence(&body);

        body.clear();
        let _ = write!(body, "GNGLL,{lat},{ns},{lon},{ew},{time},{status},A");
        self.queue_sentence(&body);

        // Satellite status roughly every 5 s
        if second % 5 == 0 {
            let satellites = match phase {
                Phase::WarmUp => (second / 10) as u32,
                Phase::Fix => 9,
                Phase::Dropout => 2,
                Phase::Silent => 0,
            };
            body.clear();
            let _ = write!(body, "GPGSV,1,1,{satellites:02},03,41,111,32,04,15,270,28");
            self.queue_sentence(&body);
        }

        // Something the logger does not understand
        self.queue_sentence("GPVTG,087.2,T,083.6,M,0.4,N,0.7,K,A");
    }

    fn queue_sentence(&mut self, body: &str) {
        let frame = frame_command(body);
        self.rx.extend(frame.as_bytes());
    }

    /// Answer `$PMTKnnn` commands with `$PMTK001,nnn,3` (command succeeded).
    fn acknowledge(&mut self, written: &[u8]) {
        let Ok(text) = std::str::from_utf8(written) else {
            return;
        };
        for line in text.split("\r\n") {
            let Some(rest) = line.strip_prefix("$PMTK") else {
                continue;
            };
            let command: String = rest.chars().take_while(char::is_ascii_digit).collect();
            if command.is_empty() {
                continue;
            }
            debug!("Simulated GPS acknowledging PMTK{}", command);
            self.queue_sentence(&format!("PMTK001,{command},3"));
        }
    }
}

impl ErrorType for SimulatedReceiver {
    type Error = Infallible;
}

impl ReadReady for SimulatedReceiver {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.catch_up();
        Ok(!self.rx.is_empty())
    }
}

impl Read for SimulatedReceiver {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.catch_up();
        let count = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

impl Write for SimulatedReceiver {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.current_phase() != Phase::Silent {
            self.acknowledge(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Slow walk north-east with a little wobble
fn position_at(second: u64) -> (f64, f64) {
    let t = second as f64;
    let latitude = ORIGIN_LATITUDE + t * 2.0e-6 + 1.5e-5 * (t / 40.0).sin();
    let longitude = ORIGIN_LONGITUDE + t * 3.0e-6 + 1.5e-5 * (t / 55.0).cos();
    (latitude, longitude)
}

/// Degrees to `[d]ddmm.mmmm` with `degree_digits` leading degree digits
fn nmea_coordinate(degrees: f64, degree_digits: usize) -> String {
    let whole = degrees.trunc();
    let minutes = (degrees - whole) * 60.0;
    format!("{:0width$}{:07.4}", whole as u32, minutes, width = degree_digits)
}

fn nmea_time(seconds_of_day: u64) -> String {
    let s = seconds_of_day % 86_400;
    format!("{:02}{:02}{:02}.00", s / 3600, (s % 3600) / 60, s % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use envlog_core::gps::parser::parse_coordinate;

    #[test]
    fn test_coordinates_round_trip_through_parser() {
        let (latitude, longitude) = position_at(120);
        let lat = parse_coordinate(&nmea_coordinate(latitude, 2), 2, "latitude");
        let lon = parse_coordinate(&nmea_coordinate(longitude, 3), 3, "longitude");
        assert!((lat - latitude).abs() < 1e-5);
        assert!((lon - longitude).abs() < 1e-5);
    }

    #[test]
    fn test_silent_phase_emits_nothing() {
        let clock = SimClock::starting_at(SILENCE_START_S * 1000);
        let mut receiver = SimulatedReceiver::new(clock.clone());
        receiver.next_second = SILENCE_START_S;
        clock.advance_ms(10_000);
        assert!(!receiver.read_ready().unwrap());

        receiver.write(b"$PMTK101*32\r\n").unwrap();
        assert!(!receiver.read_ready().unwrap());
    }

    #[test]
    fn test_pmtk_commands_are_acknowledged() {
        let mut receiver = SimulatedReceiver::new(SimClock::new());
        receiver.write(b"$PMTK101*32\r\n$PUBX,40,GLL,0,1,0,0,0,0*5D\r\n").unwrap();
        let mut buf = [0u8; 128];
        let n = receiver.read(&mut buf).unwrap();
        let text = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(text.contains("$PMTK001,101,3*30\r\n"));
    }
}
