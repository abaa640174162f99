use serde::{Deserialize, Serialize};

/// Program granularity of the on-chip flash (RP2040: 256 bytes)
pub const FLASH_PAGE_SIZE: u32 = 256;

/// Erase granularity of the on-chip flash (RP2040: 4 KiB)
pub const FLASH_SECTOR_SIZE: u32 = 4096;

/// Start of the reserved record region, measured from the start of flash
pub const STORAGE_BASE_OFFSET: u32 = 1792 * 1024;

/// Size of the reserved record region (16 sectors, 64 KiB)
pub const STORAGE_REGION_SIZE: u32 = 16 * FLASH_SECTOR_SIZE;

/// Longest NMEA line accepted before the buffer is discarded
pub const GPS_MAX_LINE_LEN: usize = 200;

/// Default deadline for a single `read_line` call
pub const GPS_READ_TIMEOUT_MS: u64 = 2_000;

/// How often the satellite count is polled while waiting for a fix
pub const GPS_SATELLITE_POLL_MS: u64 = 5_000;

/// Pause between read attempts while waiting for a fix
pub const GPS_FIX_RETRY_DELAY_MS: u32 = 200;

/// Consecutive GPS failures tolerated before a hot start is attempted
pub const GPS_RECOVERY_THRESHOLD: u32 = 10;

/// Minimum spacing between two hot-start recoveries
pub const GPS_RECOVERY_INTERVAL_MS: u64 = 60_000;

/// Interval between two persisted records
pub const SAVE_INTERVAL_MS: u64 = 60_000;

/// Wall-clock seconds assumed until the GPS provides time (2024-02-01T00:00:00Z)
pub const DEFAULT_EPOCH: u32 = 1_706_745_600;

/// Pause at the end of every main loop iteration
pub const MAIN_LOOP_DELAY_MS: u32 = 100;

/// Selectable sensor/display refresh intervals
pub const REFRESH_INTERVALS_MS: [u64; 5] = [5_000, 10_000, 30_000, 60_000, 120_000];

/// Press shorter than this is a short press
pub const SHORT_PRESS_MS: u64 = 1_000;

/// Press shorter than this (and not short) is a long press; longer presses are ignored
pub const LONG_PRESS_MS: u64 = 2_000;

/// Runtime-tunable loop parameters.
///
/// Storage geometry is intentionally not part of this struct: the reserved
/// flash region is fixed when the firmware is linked.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggerConfig {
    pub save_interval_ms: u64,
    pub gps_read_timeout_ms: u64,
    pub recovery: RecoveryConfig,
    /// Index into [`REFRESH_INTERVALS_MS`] used at boot
    pub refresh_index: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct RecoveryConfig {
    pub failure_threshold: u32,
    pub interval_ms: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            save_interval_ms: SAVE_INTERVAL_MS,
            gps_read_timeout_ms: GPS_READ_TIMEOUT_MS,
            recovery: RecoveryConfig::default(),
            refresh_index: 0,
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            failure_threshold: GPS_RECOVERY_THRESHOLD,
            interval_ms: GPS_RECOVERY_INTERVAL_MS,
        }
    }
}

impl LoggerConfig {
    /// Refresh interval selected at boot, clamped to the table
    pub fn refresh_interval_ms(&self) -> u64 {
        REFRESH_INTERVALS_MS[self.refresh_index.min(REFRESH_INTERVALS_MS.len() - 1)]
    }
}
