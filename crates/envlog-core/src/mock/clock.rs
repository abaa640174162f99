//! Virtual clock for deterministic host runs.

use alloc::rc::Rc;
use core::cell::Cell;

use embedded_hal::delay::DelayNs;

use crate::time::TimeSource;

/// Shared virtual clock.
///
/// Time only moves when something delays on it or calls
/// [`advance_ms`](Self::advance_ms), so a driver that polls with a 1 ms delay
/// walks through its deadline without real sleeping. Clones share the same
/// counter.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_us: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: u64) -> Self {
        let clock = Self::default();
        clock.now_us.set(ms * 1000);
        clock
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1000);
    }

    fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }
}

impl TimeSource for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_us.get() / 1000
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance_us((ns as u64).div_ceil(1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.advance_us(us as u64);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance_us(ms as u64 * 1000);
    }
}
