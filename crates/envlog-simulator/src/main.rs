//! Host simulator for the envlog environmental/GPS data logger.
//!
//! Runs the envlog-core main loop in virtual time against an in-RAM NOR flash,
//! a simulated NMEA receiver and synthetic sensors. Near the end of the run a
//! long press on the ACTION button is queued, which uploads the stored records
//! by printing the JSON payload to stdout and then erases the log.
//!
//! # Usage
//!
//! ```text
//! RUST_LOG=info envlog-simulator [config.json]
//! ```
//!
//! The optional JSON file overrides [`LoggerConfig`] fields; missing fields
//! keep their defaults.
//!
//! # Scripted button presses
//!
//! | Virtual time        | Button | Press | Effect                 |
//! |---------------------|--------|-------|------------------------|
//! | every 90 s          | NEXT   | short | next display page      |
//! | 30 s before the end | ACTION | long  | upload and erase       |

mod receiver;
mod sensors;

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use envlog_core::app_state::{DataLogger, DisplayPage, StatusSnapshot};
use envlog_core::config::{LoggerConfig, MAIN_LOOP_DELAY_MS};
use envlog_core::input::{BUTTON_EDGES, ButtonId, inject_press};
use envlog_core::mock::{RamFlash, SimClock};
use envlog_core::storage::RecordLog;
use envlog_core::time::{TimeSource, format_measured_at};
use envlog_core::upload::UploadBatch;

use receiver::SimulatedReceiver;
use sensors::MockSensorGenerator;

// ---------------------------------------------------------------------------
// Run constants
// ---------------------------------------------------------------------------

/// Length of the simulated run.
const RUN_DURATION_MS: u64 = 12 * 60 * 1000;

/// Interval between scripted NEXT presses.
const PAGE_PRESS_INTERVAL_MS: u64 = 90_000;

/// When the upload long press is queued, measured back from the end of the run.
const UPLOAD_LEAD_MS: u64 = 30_000;

/// Device token sent with every upload.
const DEVICE_TOKEN: &str = "00000000-0000-4000-8000-000000000000";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config() -> LoggerConfig {
    let Some(path) = std::env::args().nth(1) else {
        return LoggerConfig::default();
    };

    let parsed = std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()));
    match parsed {
        Ok(config) => {
            info!("Loaded config from {}", path);
            config
        }
        Err(e) => {
            warn!("Ignoring config {}: {}", path, e);
            LoggerConfig::default()
        }
    }
}

/// Text stand-in for the eInk display.
fn render(status: &StatusSnapshot) {
    let page = status.page;
    let line = match (page, status.readings) {
        (DisplayPage::Climate, Some(r)) => format!(
            "Temp {:.2} C  Hum {:.2} %  Press {:.1} hPa",
            r.temperature, r.humidity, r.pressure
        ),
        (DisplayPage::Particulates, Some(r)) => {
            format!("PM2.5 {}  PM5 {}  PM10 {}", r.pm2_5, r.pm5, r.pm10)
        }
        (DisplayPage::Co2, Some(r)) => format!("CO2 {} ppm", r.co2),
        (DisplayPage::Settings, _) => format!("Refresh: {} s", status.refresh_interval_ms / 1000),
        (DisplayPage::GpsStatus, _) => format!(
            "Fix: {}  Satellites: {}  Pos: {:.6}{} {:.6}{}  Time: {}",
            if status.has_fix { "yes" } else { "no" },
            status.satellites,
            status.fix.latitude,
            status.fix.north_south.as_char(),
            status.fix.longitude,
            status.fix.east_west.as_char(),
            status.fix.time
        ),
        (_, None) => "Waiting for sensors".to_string(),
    };

    let mut flags = String::new();
    if status.gps_degraded {
        flags.push_str(" [NO GPS]");
    }
    if status.storage_full {
        flags.push_str(" [STORAGE FULL]");
    }

    info!(
        "[{}] {} | {}/{} records | {}{}",
        page.title(),
        line,
        status.stored_count,
        status.capacity,
        format_measured_at(status.epoch),
        flags
    );
}

fn print_upload(batch: &UploadBatch<'_>) -> bool {
    match serde_json::to_string_pretty(batch) {
        Ok(json) => {
            println!("{json}");
            true
        }
        Err(e) => {
            error!("Failed to serialize upload: {}", e);
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting envlog simulator ({} virtual minutes)", RUN_DURATION_MS / 60_000);

    let config = load_config();
    let clock = SimClock::new();
    let mut delay = clock.clone();

    let flash = RamFlash::for_record_region();
    let mut logger = DataLogger::new(
        RecordLog::new(flash),
        SimulatedReceiver::new(clock.clone()),
        MockSensorGenerator::new(clock.clone()),
        clock.clone(),
        config,
        &BUTTON_EDGES,
    );

    if let Err(e) = logger.init() {
        error!("Logger init failed: {}", e);
        return;
    }
    logger.start_gps();

    let upload_at = RUN_DURATION_MS - UPLOAD_LEAD_MS;
    let mut upload_queued = false;
    let mut next_page_press = PAGE_PRESS_INTERVAL_MS;
    let mut saved = 0u32;
    let mut recoveries = 0u32;

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    while clock.now_ms() < RUN_DURATION_MS {
        let now = clock.now_ms();

        // --- Scripted buttons ---------------------------------------------
        if now >= next_page_press {
            inject_press(&BUTTON_EDGES, ButtonId::NextPage, now, 150);
            next_page_press += PAGE_PRESS_INTERVAL_MS;
        }
        if !upload_queued && now >= upload_at {
            inject_press(&BUTTON_EDGES, ButtonId::Action, now, 1_500);
            upload_queued = true;
        }

        // --- Logger tick --------------------------------------------------
        match logger.tick() {
            Ok(report) => {
                saved += report.saved as u32;
                recoveries += report.recovery_attempted as u32;
                if let Some(action) = report.button {
                    info!("Button: {:?}", action);
                }
            }
            Err(e) => {
                error!("Tick failed: {}", e);
                break;
            }
        }

        // --- Display ------------------------------------------------------
        if logger.take_redraw() {
            render(&logger.status());
        }

        // --- Upload -------------------------------------------------------
        if logger.take_upload_request() {
            match logger.prepare_upload(DEVICE_TOKEN) {
                Ok(batch) if batch.is_empty() => info!("No data to upload"),
                Ok(batch) => {
                    let count = batch.len();
                    if print_upload(&batch) {
                        match logger.confirm_upload() {
                            Ok(()) => info!("Uploaded {} records", count),
                            Err(e) => error!("Failed to erase after upload: {}", e),
                        }
                    }
                }
                Err(e) => error!("Failed to read records for upload: {}", e),
            }
        }

        delay.delay_ms(MAIN_LOOP_DELAY_MS);
    }

    let stats = logger.gps().stats();
    info!(
        "Simulation finished: {} records saved, {} GPS recoveries, {} lines ({} unsupported, {} bad checksum, {} timeouts)",
        saved,
        recoveries,
        stats.lines,
        stats.unsupported,
        stats.checksum_errors,
        stats.timeouts
    );
}
