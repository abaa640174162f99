//! In-memory NOR flash for host tests and the simulator.

use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::config::{FLASH_PAGE_SIZE, STORAGE_BASE_OFFSET, STORAGE_REGION_SIZE};
use crate::storage::{NvError, NvStore};

/// RAM-backed flash window with NOR semantics.
///
/// Simulates:
/// - erase to `0xFF` at page granularity, with per-page erase counters
/// - programming that can only clear bits (`stored &= data`)
/// - power loss after a given number of successful programs
/// - a failing program path while erases still succeed
/// - raw corruption injection
///
/// Clones share the same backing memory, so a test can keep a handle while a
/// [`RecordLog`](crate::storage::RecordLog) owns another, and "reboot" by
/// binding a fresh log to a clone.
#[derive(Debug, Clone)]
pub struct RamFlash {
    inner: Rc<RefCell<FlashState>>,
}

#[derive(Debug)]
struct FlashState {
    origin: u32,
    page_size: u32,
    bytes: Vec<u8>,
    erase_counts: Vec<u32>,
    programs: u32,
    programs_until_power_loss: Option<u32>,
    programs_until_program_fault: Option<u32>,
}

impl RamFlash {
    /// Erased window of `size` bytes starting at absolute address `origin`.
    pub fn new(origin: u32, size: u32, page_size: u32) -> Self {
        let pages = size.div_ceil(page_size) as usize;
        Self {
            inner: Rc::new(RefCell::new(FlashState {
                origin,
                page_size,
                bytes: vec![0xFF; size as usize],
                erase_counts: vec![0; pages],
                programs: 0,
                programs_until_power_loss: None,
                programs_until_program_fault: None,
            })),
        }
    }

    /// Window covering exactly the firmware's reserved record region
    pub fn for_record_region() -> Self {
        Self::new(STORAGE_BASE_OFFSET, STORAGE_REGION_SIZE, FLASH_PAGE_SIZE)
    }

    /// Copy of `len` bytes at `address` (for test verification)
    pub fn contents(&self, address: u32, len: usize) -> Vec<u8> {
        let state = self.inner.borrow();
        let start = (address - state.origin) as usize;
        state.bytes[start..start + len].to_vec()
    }

    /// Overwrite bytes directly, bypassing NOR semantics.
    pub fn inject_corruption(&self, address: u32, data: &[u8]) {
        let mut state = self.inner.borrow_mut();
        let start = (address - state.origin) as usize;
        state.bytes[start..start + data.len()].copy_from_slice(data);
    }

    /// Number of times the page containing `address` was erased
    pub fn erase_count(&self, address: u32) -> u32 {
        let state = self.inner.borrow();
        let page = ((address - state.origin) / state.page_size) as usize;
        state.erase_counts[page]
    }

    /// Successful program operations so far
    pub fn program_count(&self) -> u32 {
        self.inner.borrow().programs
    }

    /// Let `count` more programs succeed, then fail every program and erase
    /// with [`NvError::PowerLoss`] without touching memory.
    pub fn fail_after_programs(&self, count: u32) {
        self.inner.borrow_mut().programs_until_power_loss = Some(count);
    }

    /// Let `count` more programs succeed, then fail every program with
    /// [`NvError::PowerLoss`] while erases keep working.
    pub fn fail_programs_after(&self, count: u32) {
        self.inner.borrow_mut().programs_until_program_fault = Some(count);
    }

    pub fn restore_power(&self) {
        let mut state = self.inner.borrow_mut();
        state.programs_until_power_loss = None;
        state.programs_until_program_fault = None;
    }
}

impl FlashState {
    fn window(&self, address: u32, len: usize) -> Result<usize, NvError> {
        let out_of_bounds = NvError::OutOfBounds { address, len };
        let start = address.checked_sub(self.origin).ok_or(out_of_bounds)? as usize;
        if start + len > self.bytes.len() {
            return Err(out_of_bounds);
        }
        Ok(start)
    }

    fn powered(&self) -> Result<(), NvError> {
        match self.programs_until_power_loss {
            Some(0) => Err(NvError::PowerLoss),
            _ => Ok(()),
        }
    }
}

impl NvStore for RamFlash {
    fn page_size(&self) -> u32 {
        self.inner.borrow().page_size
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), NvError> {
        let state = self.inner.borrow();
        let start = state.window(address, buf.len())?;
        buf.copy_from_slice(&state.bytes[start..start + buf.len()]);
        Ok(())
    }

    fn program_pages(&mut self, address: u32, data: &[u8]) -> Result<(), NvError> {
        let mut state = self.inner.borrow_mut();
        if address % state.page_size != 0 || data.len() % state.page_size as usize != 0 {
            return Err(NvError::Misaligned {
                address,
                len: data.len(),
            });
        }
        let start = state.window(address, data.len())?;
        state.powered()?;
        if state.programs_until_program_fault == Some(0) {
            return Err(NvError::PowerLoss);
        }

        // Flash can only change bits from 1 to 0
        for (stored, &byte) in state.bytes[start..start + data.len()].iter_mut().zip(data) {
            *stored &= byte;
        }

        state.programs += 1;
        if let Some(remaining) = state.programs_until_power_loss.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        if let Some(remaining) = state.programs_until_program_fault.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        Ok(())
    }

    fn erase_pages(&mut self, address: u32, page_count: u32) -> Result<(), NvError> {
        let mut state = self.inner.borrow_mut();
        let len = (page_count * state.page_size) as usize;
        if address % state.page_size != 0 {
            return Err(NvError::Misaligned { address, len });
        }
        let start = state.window(address, len)?;
        state.powered()?;

        state.bytes[start..start + len].fill(0xFF);

        let first_page = start / state.page_size as usize;
        for count in &mut state.erase_counts[first_page..first_page + page_count as usize] {
            *count += 1;
        }
        Ok(())
    }
}
