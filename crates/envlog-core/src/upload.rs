//! Upload payload model.
//!
//! The transport collaborator serializes an [`UploadBatch`] to JSON and posts
//! it; the core only guarantees the field names and units below.

use alloc::string::String;
use alloc::vec::Vec;

use serde::Serialize;

use crate::storage::SensorRecord;
use crate::time::format_measured_at;

/// One measurement as sent to the server
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UploadRecord {
    /// `YYYY-MM-DD HH:MM:SS+00:00`
    pub measured_at: String,
    pub lat: f64,
    pub long: f64,
    pub co2: u32,
    pub hum: f32,
    pub temp: f32,
    pub part_2_5: u16,
    pub part_5: u16,
    pub part_10: u16,
}

impl From<&SensorRecord> for UploadRecord {
    fn from(record: &SensorRecord) -> Self {
        Self {
            measured_at: String::from(format_measured_at(record.timestamp).as_str()),
            lat: record.latitude_degrees(),
            long: record.longitude_degrees(),
            co2: record.co2,
            hum: record.humidity,
            temp: record.temperature,
            part_2_5: record.pm2_5,
            part_5: record.pm5,
            part_10: record.pm10,
        }
    }
}

/// Every stored record plus the device token
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UploadBatch<'a> {
    pub token: &'a str,
    pub measurements: Vec<UploadRecord>,
}

impl<'a> UploadBatch<'a> {
    pub fn new(token: &'a str, records: &[SensorRecord]) -> Self {
        Self {
            token,
            measurements: records.iter().map(UploadRecord::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EPOCH;
    use crate::sensors::EnvironmentReadings;

    fn record() -> SensorRecord {
        let readings = EnvironmentReadings {
            temperature: 27.75,
            humidity: 32.5,
            pressure: 1013.0,
            gas_resistance: 12_000.0,
            pm2_5: 2,
            pm5: 3,
            pm10: 5,
            co2: 1656,
        };
        SensorRecord::from_readings(
            &readings,
            Some((48.2066201, 15.6175136)),
            DEFAULT_EPOCH + 12 * 3600 + 12 * 60 + 12,
        )
    }

    #[test]
    fn test_record_maps_to_wire_fields() {
        let upload = UploadRecord::from(&record());
        assert_eq!(upload.measured_at, "2024-02-01 12:12:12+00:00");
        assert_eq!(upload.lat, 482_066_201.0 / 1e7);
        assert_eq!(upload.long, 156_175_136.0 / 1e7);

        let json = serde_json::to_value(&upload).unwrap();
        let object = json.as_object().unwrap();
        for key in [
            "measured_at",
            "lat",
            "long",
            "co2",
            "hum",
            "temp",
            "part_2_5",
            "part_5",
            "part_10",
        ] {
            assert!(object.contains_key(key), "missing {key}");
        }
        assert_eq!(object.len(), 9);
        assert_eq!(json["co2"], 1656);
        assert_eq!(json["temp"], 27.75);
    }

    #[test]
    fn test_batch_wraps_measurements_with_token() {
        let records = [record(), SensorRecord::default()];
        let batch = UploadBatch::new("device-token", &records);
        assert_eq!(batch.len(), 2);

        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["token"], "device-token");
        assert_eq!(json["measurements"].as_array().unwrap().len(), 2);
        // Records saved without a fix carry zero coordinates
        assert_eq!(json["measurements"][1]["lat"], 0.0);
    }

    #[test]
    fn test_empty_batch() {
        let batch = UploadBatch::new("t", &[]);
        assert!(batch.is_empty());
        let text = serde_json::to_string(&batch).unwrap();
        assert_eq!(text, r#"{"token":"t","measurements":[]}"#);
    }
}
