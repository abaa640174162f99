//! Hardware-independent core library for envlog
//!
//! This crate contains all platform-agnostic logic for the envlog
//! environmental/GPS data logger: the append-only flash record log, the NMEA
//! sentence reader and GPS fix tracker, button event handling, the upload
//! payload model and the application context that ties them together.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (RP2040) and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod config;
pub mod gps;
pub mod input;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod sensors;
pub mod storage;
pub mod time;
pub mod upload;
