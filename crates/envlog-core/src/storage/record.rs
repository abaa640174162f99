//! Fixed-width sensor record persisted to flash.
//!
//! Binary format (little-endian, 40 bytes):
//! - temperature: 4 bytes (f32, °C)
//! - humidity: 4 bytes (f32, %)
//! - pressure: 4 bytes (f32, hPa)
//! - gas_resistance: 4 bytes (f32, ohms)
//! - pm2_5, pm5, pm10: 3 × 2 bytes (u16, µg/m³)
//! - padding: 2 bytes (always zero)
//! - co2: 4 bytes (u32, ppm)
//! - latitude, longitude: 2 × 4 bytes (i32, degrees × 10^7)
//! - timestamp: 4 bytes (u32, seconds since epoch)

use core::fmt::Display;

use crate::sensors::EnvironmentReadings;

/// Scale between decimal degrees and the stored fixed-point coordinates
pub const COORDINATE_SCALE: f64 = 10_000_000.0;

/// One sensor sampling cycle as stored in the record log.
///
/// Binary size: 40 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorRecord {
    pub temperature: f32,
    pub humidity: f32,
    pub pressure: f32,
    pub gas_resistance: f32,
    pub pm2_5: u16,
    pub pm5: u16,
    pub pm10: u16,
    /// Keeps `co2` 4-byte aligned; persisted as zero
    _padding: [u8; 2],
    pub co2: u32,
    /// Degrees × 10^7, 0 when no fix was available
    pub latitude: i32,
    /// Degrees × 10^7, 0 when no fix was available
    pub longitude: i32,
    pub timestamp: u32,
}

impl Display for SensorRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "[SensorRecord] ts: {}, temp: {:.2}°C, hum: {:.2}%, co2: {} ppm, pm2.5/5/10: {}/{}/{}, pos: {:.7},{:.7}",
            self.timestamp,
            self.temperature,
            self.humidity,
            self.co2,
            self.pm2_5,
            self.pm5,
            self.pm10,
            self.latitude_degrees(),
            self.longitude_degrees()
        )
    }
}

impl SensorRecord {
    /// Persisted size in bytes
    pub const SIZE: usize = 40;

    /// Build a record from one sensor sweep.
    ///
    /// `position` is `(latitude, longitude)` in signed decimal degrees; `None`
    /// stores zeroed coordinates.
    pub fn from_readings(
        readings: &EnvironmentReadings,
        position: Option<(f64, f64)>,
        timestamp: u32,
    ) -> Self {
        let mut record = Self {
            temperature: readings.temperature,
            humidity: readings.humidity,
            pressure: readings.pressure,
            gas_resistance: readings.gas_resistance,
            pm2_5: readings.pm2_5,
            pm5: readings.pm5,
            pm10: readings.pm10,
            _padding: [0; 2],
            co2: readings.co2,
            latitude: 0,
            longitude: 0,
            timestamp,
        };
        if let Some((latitude, longitude)) = position {
            record.set_position(latitude, longitude);
        }
        record
    }

    /// Store a position given in decimal degrees.
    pub fn set_position(&mut self, latitude: f64, longitude: f64) {
        self.latitude = degrees_to_fixed(latitude);
        self.longitude = degrees_to_fixed(longitude);
    }

    pub fn latitude_degrees(&self) -> f64 {
        self.latitude as f64 / COORDINATE_SCALE
    }

    pub fn longitude_degrees(&self) -> f64 {
        self.longitude as f64 / COORDINATE_SCALE
    }

    /// True when the record was written without a GPS fix
    pub fn has_position(&self) -> bool {
        self.latitude != 0 || self.longitude != 0
    }

    /// Converts the record to its persisted byte layout.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];

        // Write environmental floats (little-endian)
        bytes[0..4].copy_from_slice(&self.temperature.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.humidity.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.pressure.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.gas_resistance.to_le_bytes());

        // Write particulate counts
        bytes[16..18].copy_from_slice(&self.pm2_5.to_le_bytes());
        bytes[18..20].copy_from_slice(&self.pm5.to_le_bytes());
        bytes[20..22].copy_from_slice(&self.pm10.to_le_bytes());

        // 22..24 is padding and is already zero

        bytes[24..28].copy_from_slice(&self.co2.to_le_bytes());
        bytes[28..32].copy_from_slice(&self.latitude.to_le_bytes());
        bytes[32..36].copy_from_slice(&self.longitude.to_le_bytes());
        bytes[36..40].copy_from_slice(&self.timestamp.to_le_bytes());

        bytes
    }

    /// Creates a record from its persisted byte layout.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            temperature: f32::from_le_bytes(word(bytes, 0)),
            humidity: f32::from_le_bytes(word(bytes, 4)),
            pressure: f32::from_le_bytes(word(bytes, 8)),
            gas_resistance: f32::from_le_bytes(word(bytes, 12)),
            pm2_5: u16::from_le_bytes(half(bytes, 16)),
            pm5: u16::from_le_bytes(half(bytes, 18)),
            pm10: u16::from_le_bytes(half(bytes, 20)),
            _padding: [0; 2],
            co2: u32::from_le_bytes(word(bytes, 24)),
            latitude: i32::from_le_bytes(word(bytes, 28)),
            longitude: i32::from_le_bytes(word(bytes, 32)),
            timestamp: u32::from_le_bytes(word(bytes, 36)),
        }
    }
}

fn degrees_to_fixed(degrees: f64) -> i32 {
    let scaled = degrees * COORDINATE_SCALE;
    // Round half away from zero without `f64::round` (not available in core)
    if scaled >= 0.0 {
        (scaled + 0.5) as i32
    } else {
        (scaled - 0.5) as i32
    }
}

fn word(bytes: &[u8; SensorRecord::SIZE], offset: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&bytes[offset..offset + 4]);
    out
}

fn half(bytes: &[u8; SensorRecord::SIZE], offset: usize) -> [u8; 2] {
    let mut out = [0u8; 2];
    out.copy_from_slice(&bytes[offset..offset + 2]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SensorRecord {
        let readings = EnvironmentReadings {
            temperature: 21.5,
            humidity: 48.25,
            pressure: 1013.2,
            gas_resistance: 52_000.0,
            pm2_5: 12,
            pm5: 14,
            pm10: 20,
            co2: 612,
        };
        SensorRecord::from_readings(&readings, Some((48.205760, -16.629817)), 1_706_745_600)
    }

    #[test]
    fn test_record_size() {
        assert_eq!(SensorRecord::SIZE, 40);
        assert_eq!(core::mem::size_of::<SensorRecord>(), SensorRecord::SIZE);
    }

    #[test]
    fn test_padding_is_zero() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[22..24], &[0, 0]);
    }

    #[test]
    fn test_field_offsets() {
        let record = sample();
        let bytes = record.to_bytes();
        assert_eq!(&bytes[16..18], &12u16.to_le_bytes());
        assert_eq!(&bytes[24..28], &612u32.to_le_bytes());
        assert_eq!(&bytes[28..32], &482_057_600i32.to_le_bytes());
        assert_eq!(&bytes[36..40], &1_706_745_600u32.to_le_bytes());
    }

    #[test]
    fn test_bytes_restore_every_field() {
        let record = sample();
        assert_eq!(SensorRecord::from_bytes(&record.to_bytes()), record);
    }

    #[test]
    fn test_negative_coordinates_round_to_nearest() {
        let record = sample();
        assert_eq!(record.longitude, -166_298_170);
        assert!(record.has_position());
    }

    #[test]
    fn test_missing_position_is_zeroed() {
        let readings = EnvironmentReadings::default();
        let record = SensorRecord::from_readings(&readings, None, 0);
        assert_eq!(record.latitude, 0);
        assert_eq!(record.longitude, 0);
        assert!(!record.has_position());
    }
}
