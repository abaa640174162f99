//! Host-side stand-ins for the board collaborators.
//!
//! Compiled for unit tests and behind the `mock` feature for the simulator.

mod clock;
mod flash;
mod serial;

pub use clock::*;
pub use flash::*;
pub use serial::*;

use crate::sensors::{EnvironmentReadings, SensorError, SensorSuite};

/// Sensor suite returning canned readings.
#[derive(Debug, Clone, Default)]
pub struct FixedSensors {
    pub readings: EnvironmentReadings,
    /// Fail every read with `ReadFailed` while set
    pub failing: bool,
    pub reads: u32,
}

impl FixedSensors {
    pub fn new(readings: EnvironmentReadings) -> Self {
        Self {
            readings,
            failing: false,
            reads: 0,
        }
    }
}

impl SensorSuite for FixedSensors {
    fn read_all(&mut self) -> Result<EnvironmentReadings, SensorError> {
        self.reads += 1;
        if self.failing {
            return Err(SensorError::ReadFailed {
                sensor: "mock",
                operation: "read canned values",
            });
        }
        Ok(self.readings)
    }
}
