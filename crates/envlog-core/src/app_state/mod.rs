//! Application context and error types for envlog
//!
//! [`DataLogger`] owns every subsystem and all mutable loop state. The board
//! layer constructs it once, calls [`DataLogger::init`] and then
//! [`DataLogger::tick`] from its main loop.

mod display;

pub use display::*;

use embedded_hal::delay::DelayNs;
use embedded_io::{Read, ReadReady, Write};
use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::config::{GPS_SATELLITE_POLL_MS, LoggerConfig};
use crate::gps::{Gps, GpsError, ReadOutcome, RecoveryPolicy};
use crate::input::{ButtonChannel, ButtonClassifier, ButtonId, ButtonPress, PressKind};
use crate::sensors::{EnvironmentReadings, SensorError, SensorSuite};
use crate::storage::{NvStore, RecordLog, SensorRecord, StorageError};
use crate::time::{TimeSource, WallClock};
use crate::upload::UploadBatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    /// Logging, but the last GPS read gave no valid fix
    AcquiringFix,
    Logging,
    /// Log is full; records are dropped until an upload is confirmed
    StorageFull,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(StorageError),
    #[error("GPS error: {0}")]
    Gps(GpsError),
    #[error("Sensor error: {0}")]
    Sensor(SensorError),
    #[error("Logger used before init")]
    NotInitialized,
}

impl From<StorageError> for AppError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<GpsError> for AppError {
    fn from(value: GpsError) -> Self {
        Self::Gps(value)
    }
}

impl From<SensorError> for AppError {
    fn from(value: SensorError) -> Self {
        Self::Sensor(value)
    }
}

/// How the GPS read of one tick ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpsTick {
    Fix,
    NoFix,
    /// Timeout or serial error; nothing was parsed
    #[default]
    NoSentence,
}

/// What happened during one [`DataLogger::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub gps: GpsTick,
    pub recovery_attempted: bool,
    pub sensors_read: bool,
    pub saved: bool,
    pub button: Option<ButtonAction>,
}

/// Top-level application context.
///
/// Owns the record log, the GPS receiver, the sensors and every piece of
/// state the main loop mutates. Button interrupts reach it only through the
/// shared edge channel.
pub struct DataLogger<'a, S, U, C, E>
where
    S: NvStore,
    U: Read + ReadReady + Write,
    C: TimeSource + DelayNs,
    E: SensorSuite,
{
    log: RecordLog<S>,
    gps: Gps<U, C>,
    sensors: E,
    clock: C,
    config: LoggerConfig,
    recovery: RecoveryPolicy,
    wall_clock: WallClock,
    buttons: ButtonClassifier,
    button_edges: &'a ButtonChannel,
    display: DisplayState,
    run_state: AppRunState,
    readings: Option<EnvironmentReadings>,
    position: Option<(f64, f64)>,
    satellites: u32,
    last_sensor_ms: Option<u64>,
    last_save_ms: u64,
    last_satellite_poll_ms: u64,
    gps_degraded: bool,
    storage_full: bool,
}

impl<'a, S, U, C, E> DataLogger<'a, S, U, C, E>
where
    S: NvStore,
    U: Read + ReadReady + Write,
    C: TimeSource + DelayNs,
    E: SensorSuite,
{
    pub fn new(
        log: RecordLog<S>,
        gps_serial: U,
        sensors: E,
        clock: C,
        config: LoggerConfig,
        button_edges: &'a ButtonChannel,
    ) -> Self {
        Self {
            log,
            gps: Gps::new(gps_serial, clock.clone()),
            sensors,
            recovery: RecoveryPolicy::new(config.recovery),
            display: DisplayState::new(config.refresh_index),
            clock,
            config,
            wall_clock: WallClock::default(),
            buttons: ButtonClassifier::new(),
            button_edges,
            run_state: AppRunState::Uninitialized,
            readings: None,
            position: None,
            satellites: 0,
            last_sensor_ms: None,
            last_save_ms: 0,
            last_satellite_poll_ms: 0,
            gps_degraded: false,
            storage_full: false,
        }
    }

    /// Bring up the record log.
    ///
    /// A corrupt persisted count is logged and the region is erased; the
    /// records it guarded cannot be trusted anyway.
    pub fn init(&mut self) -> Result<(), AppError> {
        match self.log.init() {
            Ok(()) => {}
            Err(StorageError::InvalidPersistedState { found, capacity }) => {
                error!(
                    "Discarding record region: persisted count {} exceeds capacity {}",
                    found, capacity
                );
                self.log.erase_all()?;
            }
            Err(e) => return Err(e.into()),
        }

        let now = self.clock.now_ms();
        self.wall_clock = WallClock::new(self.wall_clock.now_epoch(now), now);
        self.last_save_ms = now;
        self.last_satellite_poll_ms = now;
        self.storage_full = self.log.is_full();
        self.run_state = if self.storage_full {
            AppRunState::StorageFull
        } else {
            AppRunState::AcquiringFix
        };

        info!(
            "Data logger ready: {}/{} records stored, refresh every {} ms",
            self.log.stored_count(),
            self.log.capacity(),
            self.display.refresh_interval_ms()
        );
        Ok(())
    }

    /// Boot-time GPS configuration.
    ///
    /// Enables the time sentences and cold-starts the module, falling back to
    /// a hot start. Every step is best-effort.
    pub fn start_gps(&mut self) {
        if let Err(e) = self.gps.enable_time_messages() {
            warn!("{}", e);
        }
        if let Err(e) = self.gps.cold_start() {
            warn!("{}, trying hot start instead", e);
            if let Err(e) = self.gps.hot_start() {
                warn!("{}", e);
            }
        }
    }

    /// One main loop iteration.
    pub fn tick(&mut self) -> Result<TickReport, AppError> {
        if self.run_state == AppRunState::Uninitialized {
            return Err(AppError::NotInitialized);
        }

        let mut report = TickReport {
            button: self.handle_buttons(),
            ..TickReport::default()
        };

        report.gps = self.update_position();

        let now = self.clock.now_ms();
        if self.recovery.should_recover(now) {
            if let Err(e) = self.gps.hot_start() {
                warn!("GPS recovery: {}", e);
            }
            self.recovery.mark_recovery(now);
            report.recovery_attempted = true;
        }

        let now = self.clock.now_ms();
        let refresh_ms = self.display.refresh_interval_ms();
        let sensors_due = self
            .last_sensor_ms
            .is_none_or(|last| now.saturating_sub(last) >= refresh_ms);
        if sensors_due {
            self.last_sensor_ms = Some(now);
            match self.sensors.read_all() {
                Ok(readings) => {
                    self.readings = Some(readings);
                    self.display.redraw_requested = true;
                    report.sensors_read = true;
                }
                Err(e) => warn!("Sensor sweep failed: {}", e),
            }
        }

        if report.sensors_read && now.saturating_sub(self.last_save_ms) >= self.config.save_interval_ms
        {
            report.saved = self.save_record(now)?;
        }

        if self.clock.elapsed_since(self.last_satellite_poll_ms) >= GPS_SATELLITE_POLL_MS {
            self.satellites = self.gps.visible_satellites(self.config.gps_read_timeout_ms);
            self.last_satellite_poll_ms = self.clock.now_ms();
        }

        self.run_state = if self.storage_full {
            AppRunState::StorageFull
        } else if self.position.is_some() {
            AppRunState::Logging
        } else {
            AppRunState::AcquiringFix
        };

        Ok(report)
    }

    /// Apply every queued button press; returns the last resulting action.
    pub fn handle_buttons(&mut self) -> Option<ButtonAction> {
        let mut last = None;
        while let Some(press) = self.buttons.poll(self.button_edges) {
            last = Some(self.apply_press(press));
        }
        last
    }

    pub fn status(&self) -> StatusSnapshot {
        let fix = *self.gps.last_known_fix();
        StatusSnapshot {
            run_state: self.run_state,
            page: self.display.page,
            refresh_interval_ms: self.display.refresh_interval_ms(),
            readings: self.readings,
            fix,
            has_fix: self.position.is_some(),
            satellites: self.satellites,
            consecutive_gps_failures: self.recovery.consecutive_failures(),
            stored_count: self.log.stored_count(),
            capacity: self.log.capacity(),
            gps_degraded: self.gps_degraded,
            storage_full: self.storage_full,
            upload_requested: self.display.upload_requested,
            epoch: self.wall_clock.now_epoch(self.clock.now_ms()),
        }
    }

    /// Clear the redraw flag; true if the display should be redrawn
    pub fn take_redraw(&mut self) -> bool {
        core::mem::take(&mut self.display.redraw_requested)
    }

    /// Clear the upload request; true if the operator asked for an upload
    pub fn take_upload_request(&mut self) -> bool {
        core::mem::take(&mut self.display.upload_requested)
    }

    /// Read back every stored record as an upload payload.
    ///
    /// Nothing is erased until [`confirm_upload`](Self::confirm_upload).
    pub fn prepare_upload<'t>(&mut self, token: &'t str) -> Result<UploadBatch<'t>, AppError> {
        let records = self.log.load_all()?;
        info!("Prepared upload of {} records", records.len());
        Ok(UploadBatch::new(token, &records))
    }

    /// The transport delivered the batch; drop the stored records.
    pub fn confirm_upload(&mut self) -> Result<(), AppError> {
        self.log.erase_all()?;
        self.storage_full = false;
        self.display.upload_requested = false;
        if self.run_state == AppRunState::StorageFull {
            self.run_state = AppRunState::AcquiringFix;
        }
        info!("Upload confirmed, record log erased");
        Ok(())
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn log(&self) -> &RecordLog<S> {
        &self.log
    }

    pub fn gps(&self) -> &Gps<U, C> {
        &self.gps
    }

    pub fn sensors_mut(&mut self) -> &mut E {
        &mut self.sensors
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn update_position(&mut self) -> GpsTick {
        let outcome = self.gps.read_line(self.config.gps_read_timeout_ms);
        let now = self.clock.now_ms();

        match outcome {
            Ok(ReadOutcome::Fix(fix)) => {
                self.position = fix.position();
                self.recovery.record_success();
                if self.wall_clock.sync(fix.date, fix.time, now) {
                    debug!("Clock synced to GPS time {}", fix.time);
                }
                GpsTick::Fix
            }
            Ok(ReadOutcome::NoFix(_)) => {
                debug!("GPS sentence without valid fix, coordinates zeroed");
                self.position = None;
                self.recovery.record_failure();
                GpsTick::NoFix
            }
            Err(e) => {
                debug!("GPS read failed: {}", e);
                self.position = None;
                self.recovery.record_failure();
                GpsTick::NoSentence
            }
        }
    }

    /// Persist the latest readings. Returns whether a record was written.
    fn save_record(&mut self, now: u64) -> Result<bool, AppError> {
        if self.storage_full {
            debug!("Storage full, record not saved");
            return Ok(false);
        }
        let Some(readings) = self.readings else {
            return Ok(false);
        };

        let timestamp = self.wall_clock.now_epoch(now);
        let record = SensorRecord::from_readings(&readings, self.position, timestamp);

        match self.log.append(&record) {
            Ok(()) => {
                self.last_save_ms = now;
                self.gps_degraded = self.position.is_none();
                if self.gps_degraded {
                    warn!("Record saved without GPS position");
                }
                info!(
                    "Saved record {}/{}: {}",
                    self.log.stored_count(),
                    self.log.capacity(),
                    record
                );
                if self.log.is_full() {
                    warn!("Record storage is now full, upload required");
                    self.storage_full = true;
                }
                Ok(true)
            }
            Err(StorageError::StorageFull { capacity }) => {
                warn!("Record storage full ({} records), upload required", capacity);
                self.storage_full = true;
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn apply_press(&mut self, press: ButtonPress) -> ButtonAction {
        debug!(
            "{:?} {:?} press ({} ms)",
            press.button, press.kind, press.duration_ms
        );

        match (press.button, press.kind) {
            (ButtonId::NextPage, _) => ButtonAction::PageChanged(self.display.next_page()),
            (ButtonId::Action, PressKind::Long) => {
                info!("Upload requested, {} records stored", self.log.stored_count());
                self.display.upload_requested = true;
                ButtonAction::UploadRequested
            }
            (ButtonId::Action, PressKind::Short) if self.display.page == DisplayPage::Settings => {
                let interval_ms = self.display.cycle_refresh_interval();
                info!("Refresh interval set to {} s", interval_ms / 1000);
                ButtonAction::RefreshIntervalChanged { interval_ms }
            }
            (ButtonId::Action, PressKind::Short) => {
                self.display.redraw_requested = true;
                ButtonAction::RefreshDisplay
            }
        }
    }
}
