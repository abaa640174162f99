//! Byte-addressable non-volatile store abstraction.
//!
//! The record log talks to flash exclusively through [`NvStore`]. Hardware
//! backends wrap the vendor flash routines; [`crate::mock::RamFlash`] emulates
//! NOR semantics in RAM for host tests and the simulator.

use thiserror_no_std::Error;

/// Errors reported by an [`NvStore`] backend
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvError {
    #[error("Address range {address:#x}+{len} is outside the store")]
    OutOfBounds { address: u32, len: usize },
    #[error("Address {address:#x} or length {len} is not page aligned")]
    Misaligned { address: u32, len: usize },
    #[error("Power lost during flash operation")]
    PowerLoss,
    #[error("Flash hardware reported a failure")]
    Hardware,
}

/// Page-granular flash primitive.
///
/// Addresses are absolute offsets from the start of the flash device.
///
/// # Semantics
///
/// - `erase_pages` sets every byte in the given pages to `0xFF`.
/// - `program_pages` can only clear bits: programming `0xFF` over a byte leaves
///   it untouched, so a page may be programmed again as long as the newly
///   written bytes were still erased.
/// - `read` is contiguous and not restricted to page boundaries (the XIP
///   memory-mapped path on the target).
///
/// Callers are responsible for running `program_pages` and `erase_pages` with
/// interrupts suppressed; see [`crate::storage::RecordLog`].
pub trait NvStore {
    /// Program granularity in bytes (a power of two)
    fn page_size(&self) -> u32;

    /// Read `buf.len()` bytes starting at `address`.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), NvError>;

    /// Program whole pages. `address` must be page aligned and `data.len()` a
    /// multiple of the page size.
    fn program_pages(&mut self, address: u32, data: &[u8]) -> Result<(), NvError>;

    /// Erase `page_count` pages starting at the page-aligned `address`.
    fn erase_pages(&mut self, address: u32, page_count: u32) -> Result<(), NvError>;
}
