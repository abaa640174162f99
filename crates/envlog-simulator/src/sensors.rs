use envlog_core::mock::SimClock;
use envlog_core::sensors::{EnvironmentReadings, SensorError, SensorSuite};
use envlog_core::time::TimeSource;

/// The CO2 sensor needs this long after power-up before its first result
const CO2_WARM_UP_SECS: f64 = 3.0;

/// Generates synthetic sensor readings that vary over virtual time.
pub struct MockSensorGenerator {
    clock: SimClock,
}

impl MockSensorGenerator {
    pub fn new(clock: SimClock) -> Self {
        Self { clock }
    }
}

impl SensorSuite for MockSensorGenerator {
    fn read_all(&mut self) -> Result<EnvironmentReadings, SensorError> {
        let t = self.clock.now_ms() as f64 / 1000.0;

        if t < CO2_WARM_UP_SECS {
            return Err(SensorError::NotReady { sensor: "PAS CO2" });
        }

        // Temperature: 20–26 °C sinusoidal with slow drift
        let temperature = 23.0 + 3.0 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos();

        // Humidity: 40–60 % with different period
        let humidity = 50.0 + 10.0 * (t / 180.0).sin() + 2.0 * (t / 23.0).cos();

        // CO₂: 400–800 ppm with a longer cycle
        let co2 = 600.0 + 200.0 * (t / 300.0).sin() + 30.0 * (t / 41.0).cos();

        let pressure = 1013.0 + 4.0 * (t / 600.0).sin();
        let gas_resistance = 45_000.0 + 8_000.0 * (t / 90.0).cos();

        // Particulates: low background with occasional bumps
        let pm2_5 = 6.0 + 4.0 * (t / 70.0).sin().max(0.0) + 1.5 * (t / 13.0).cos();
        let pm10 = pm2_5 * 1.6 + 2.0;

        Ok(EnvironmentReadings {
            temperature: temperature as f32,
            humidity: humidity as f32,
            pressure: pressure as f32,
            gas_resistance: gas_resistance as f32,
            pm2_5: pm2_5 as u16,
            // HM3301 reports no PM5 channel; mirror PM2.5
            pm5: pm2_5 as u16,
            pm10: pm10 as u16,
            co2: co2 as u32,
        })
    }
}
