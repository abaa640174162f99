//! Sensor abstraction.
//!
//! The register-level drivers (particulate, gas/temperature/humidity, CO2)
//! live with the board support code; the core only sees one sweep of
//! readings per sampling cycle.

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: failed to {operation}")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor}: timed out waiting to {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
    #[error("{sensor}: no measurement available yet")]
    NotReady { sensor: &'static str },
}

/// One sweep over all environmental sensors
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvironmentReadings {
    /// °C
    pub temperature: f32,
    /// %
    pub humidity: f32,
    /// hPa
    pub pressure: f32,
    /// ohms
    pub gas_resistance: f32,
    /// µg/m³
    pub pm2_5: u16,
    pub pm5: u16,
    pub pm10: u16,
    /// ppm
    pub co2: u32,
}

/// Board-provided set of environmental sensors.
pub trait SensorSuite {
    /// Read every sensor once.
    fn read_all(&mut self) -> Result<EnvironmentReadings, SensorError>;
}
