use crate::config::REFRESH_INTERVALS_MS;
use crate::gps::FixState;
use crate::sensors::EnvironmentReadings;

use super::AppRunState;

/// Pages of the status display, in button cycling order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayPage {
    /// Temperature, humidity, pressure
    #[default]
    Climate,
    Particulates,
    Co2,
    /// Refresh interval selection
    Settings,
    GpsStatus,
}

impl DisplayPage {
    pub const COUNT: usize = 5;

    pub fn next(self) -> Self {
        match self {
            Self::Climate => Self::Particulates,
            Self::Particulates => Self::Co2,
            Self::Co2 => Self::Settings,
            Self::Settings => Self::GpsStatus,
            Self::GpsStatus => Self::Climate,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Climate => "Climate",
            Self::Particulates => "Particulates",
            Self::Co2 => "CO2",
            Self::Settings => "Settings",
            Self::GpsStatus => "GPS Status",
        }
    }
}

/// What a classified button press did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    PageChanged(DisplayPage),
    /// Redraw the current page with fresh data
    RefreshDisplay,
    RefreshIntervalChanged { interval_ms: u64 },
    UploadRequested,
}

/// UI state owned by the application context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayState {
    pub page: DisplayPage,
    pub refresh_index: usize,
    /// Set whenever the display collaborator should redraw
    pub redraw_requested: bool,
    pub upload_requested: bool,
}

impl DisplayState {
    pub fn new(refresh_index: usize) -> Self {
        Self {
            page: DisplayPage::default(),
            refresh_index: refresh_index.min(REFRESH_INTERVALS_MS.len() - 1),
            redraw_requested: true,
            upload_requested: false,
        }
    }

    pub fn refresh_interval_ms(&self) -> u64 {
        REFRESH_INTERVALS_MS[self.refresh_index]
    }

    pub fn next_page(&mut self) -> DisplayPage {
        self.page = self.page.next();
        self.redraw_requested = true;
        self.page
    }

    pub fn cycle_refresh_interval(&mut self) -> u64 {
        self.refresh_index = (self.refresh_index + 1) % REFRESH_INTERVALS_MS.len();
        self.redraw_requested = true;
        self.refresh_interval_ms()
    }
}

/// Everything the display collaborator needs to draw one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusSnapshot {
    pub run_state: AppRunState,
    pub page: DisplayPage,
    pub refresh_interval_ms: u64,
    pub readings: Option<EnvironmentReadings>,
    pub fix: FixState,
    pub has_fix: bool,
    pub satellites: u32,
    pub consecutive_gps_failures: u32,
    pub stored_count: u32,
    pub capacity: u32,
    /// The last record was saved without a position
    pub gps_degraded: bool,
    /// Buffering is paused until an upload is confirmed
    pub storage_full: bool,
    pub upload_requested: bool,
    pub epoch: u32,
}
