//! Append-only, crash-consistent record log on page-programmed flash.
//!
//! ## Layout
//!
//! ```text
//! base                 base + page_size                          base + region_size
//! | count journal page | record 0 | record 1 | ... | record N-1 | 0xFF ... |
//! ```
//!
//! The first page holds the record count as a journal of 32-bit slots. Each
//! commit programs the next erased slot; the committed count is the value in
//! the last programmed slot. A fully erased journal means the region was never
//! initialized. When every slot is used the page is erased and slot 0 is
//! programmed again, which is the only moment the count page is erased outside
//! of `erase_all`. A power loss between that erase and the slot 0 program
//! leaves an erased journal: the next `init` formats the count to zero and
//! every record stored so far is lost.
//!
//! Records are packed back to back from `base + page_size` and freely straddle
//! page boundaries.
//!
//! ## Commit ordering
//!
//! Record bytes are always programmed before the count that covers them. A
//! power loss between the two leaves bytes past the committed end that no
//! reader will ever look at; the next append notices they are not erased and
//! rewrites the affected pages before programming.
//!
//! That rewrite erases the committed records sharing those pages before
//! programming them back. A power loss between the erase and the program
//! leaves committed records that read as erased flash. Readers never hand
//! those out: `load_all` skips them and `read_record` reports
//! [`StorageError::ErasedRecord`].

use alloc::vec;
use alloc::vec::Vec;

use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use super::nv_store::{NvError, NvStore};
use super::record::SensorRecord;
use crate::config::{STORAGE_BASE_OFFSET, STORAGE_REGION_SIZE};

const ERASED_BYTE: u8 = 0xFF;
const ERASED_WORD: u32 = u32::MAX;
const SLOT_SIZE: u32 = 4;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record storage is full ({capacity} records)")]
    StorageFull { capacity: u32 },
    #[error("Persisted record count {found} is invalid (capacity {capacity})")]
    InvalidPersistedState { found: u32, capacity: u32 },
    #[error("Record log used before init")]
    NotInitialized,
    #[error("Record {index} requested but only {count} stored")]
    RecordOutOfRange { index: u32, count: u32 },
    #[error("Committed record {index} reads as erased flash")]
    ErasedRecord { index: u32 },
    #[error("Flash error: {0}")]
    Nv(NvError),
}

impl From<NvError> for StorageError {
    fn from(value: NvError) -> Self {
        Self::Nv(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogState {
    /// `init` has not run yet
    Uninitialized,
    Ready,
    /// The persisted count could not be trusted; only `erase_all` clears this
    Corrupt { found: u32 },
}

/// Result of scanning the count journal page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JournalScan {
    Erased,
    Committed { slot: u32, count: u32 },
    Invalid { found: u32 },
}

/// Append-only sensor record log bound to a fixed flash region.
///
/// ## Memory Usage
///
/// No records are cached. Appends allocate a scratch image of the one or two
/// pages they touch; `append_batch` allocates the pages covering the whole
/// batch and `load_all` allocates the returned vector.
pub struct RecordLog<S: NvStore> {
    store: S,
    base: u32,
    region_size: u32,
    page_size: u32,
    capacity: u32,
    stored_count: u32,
    /// Last programmed slot of the count journal, `None` when the page is erased
    journal_slot: Option<u32>,
    state: LogState,
}

impl<S: NvStore> RecordLog<S> {
    /// Bind to the region reserved by the firmware link layout.
    pub fn new(store: S) -> Self {
        Self::with_region(store, STORAGE_BASE_OFFSET, STORAGE_REGION_SIZE)
    }

    /// Bind to an explicit region. `base` and `region_size` must be page aligned.
    pub fn with_region(store: S, base: u32, region_size: u32) -> Self {
        let page_size = store.page_size();
        let capacity = region_size.saturating_sub(page_size) / SensorRecord::SIZE as u32;

        Self {
            store,
            base,
            region_size,
            page_size,
            capacity,
            stored_count: 0,
            journal_slot: None,
            state: LogState::Uninitialized,
        }
    }

    /// Read the persisted count and adopt it.
    ///
    /// An erased count page is initialized to zero. A count above capacity (or
    /// a journal that is not monotonic) leaves the log in [`LogState::Corrupt`]
    /// with a zero in-memory count and is reported to the caller, who decides
    /// whether to [`erase_all`](Self::erase_all). Calling `init` again on an
    /// initialized region is harmless.
    pub fn init(&mut self) -> Result<(), StorageError> {
        let mut page = vec![0u8; self.page_size as usize];
        self.store.read(self.base, &mut page).map_err(|e| {
            error!("Failed to read record count page at {:#x}: {:?}", self.base, e);
            StorageError::Nv(e)
        })?;

        match self.scan_journal(&page) {
            JournalScan::Erased => {
                info!(
                    "Record region at {:#x} is uninitialized, writing zero count",
                    self.base
                );
                self.stored_count = 0;
                self.journal_slot = None;
                self.commit_count(0)?;
                self.state = LogState::Ready;
            }
            JournalScan::Committed { slot, count } => {
                self.stored_count = count;
                self.journal_slot = Some(slot);
                self.state = LogState::Ready;
                info!(
                    "Record log ready: {}/{} records (journal slot {})",
                    count, self.capacity, slot
                );
            }
            JournalScan::Invalid { found } => {
                error!(
                    "Persisted record count {} is invalid (capacity {})",
                    found, self.capacity
                );
                self.stored_count = 0;
                self.journal_slot = None;
                self.state = LogState::Corrupt { found };
                return Err(StorageError::InvalidPersistedState {
                    found,
                    capacity: self.capacity,
                });
            }
        }

        Ok(())
    }

    /// Append one record. The record becomes visible only once its count
    /// commit has been programmed.
    pub fn append(&mut self, record: &SensorRecord) -> Result<(), StorageError> {
        self.ensure_ready()?;

        if self.is_full() {
            return Err(StorageError::StorageFull {
                capacity: self.capacity,
            });
        }

        let index = self.stored_count;
        self.write_records(index, &record.to_bytes())?;
        self.commit_count(index + 1)?;

        debug!("Appended record {} at {:#x}", index, self.record_address(index));
        Ok(())
    }

    /// Append several records with a single count commit.
    ///
    /// All pages covering the batch are programmed in one operation and the
    /// count is committed once at the end. The guarantee is weaker than
    /// [`append`](Self::append): a power loss before the commit drops the whole
    /// batch, even records whose pages were already programmed.
    pub fn append_batch(&mut self, records: &[SensorRecord]) -> Result<(), StorageError> {
        self.ensure_ready()?;

        if records.is_empty() {
            return Ok(());
        }

        let total = u32::try_from(records.len())
            .ok()
            .and_then(|len| self.stored_count.checked_add(len))
            .filter(|&total| total <= self.capacity)
            .ok_or(StorageError::StorageFull {
                capacity: self.capacity,
            })?;

        let mut bytes = Vec::with_capacity(records.len() * SensorRecord::SIZE);
        for record in records {
            bytes.extend_from_slice(&record.to_bytes());
        }

        let first = self.stored_count;
        self.write_records(first, &bytes)?;
        self.commit_count(total)?;

        debug!("Appended batch of {} records ({}..{})", records.len(), first, total);
        Ok(())
    }

    /// Read back every committed record in append order.
    ///
    /// Committed records whose bytes read as erased flash are left out.
    pub fn load_all(&mut self) -> Result<Vec<SensorRecord>, StorageError> {
        self.ensure_ready()?;

        let mut records = Vec::with_capacity(self.stored_count as usize);
        let mut skipped = 0u32;
        for index in 0..self.stored_count {
            match self.read_committed(index) {
                Ok(record) => records.push(record),
                Err(StorageError::ErasedRecord { .. }) => skipped += 1,
                Err(e) => return Err(e),
            }
        }

        if skipped > 0 {
            warn!(
                "{} of {} committed records read as erased and were skipped",
                skipped, self.stored_count
            );
        }
        Ok(records)
    }

    /// Read a single committed record.
    pub fn read_record(&mut self, index: u32) -> Result<SensorRecord, StorageError> {
        self.ensure_ready()?;

        if index >= self.stored_count {
            return Err(StorageError::RecordOutOfRange {
                index,
                count: self.stored_count,
            });
        }

        self.read_committed(index)
    }

    /// Erase the whole region and commit a zero count.
    ///
    /// Also the only way out of [`LogState::Corrupt`].
    pub fn erase_all(&mut self) -> Result<(), StorageError> {
        let pages = self.region_size / self.page_size;
        info!(
            "Erasing record region: {} pages at {:#x} ({} records dropped)",
            pages, self.base, self.stored_count
        );

        self.state = LogState::Uninitialized;
        self.stored_count = 0;
        self.journal_slot = None;

        self.erase(self.base, pages)?;
        self.commit_count(0)?;

        self.state = LogState::Ready;
        Ok(())
    }

    /// Same as [`erase_all`](Self::erase_all).
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.erase_all()
    }

    pub fn is_full(&self) -> bool {
        self.stored_count >= self.capacity
    }

    pub fn stored_count(&self) -> u32 {
        self.stored_count
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn state(&self) -> LogState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Release the underlying store.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Log the first `len` bytes of the region as a hex dump.
    pub fn dump_raw(&mut self, len: usize) -> Result<(), StorageError> {
        let len = len.min(self.region_size as usize);
        debug!("Raw record region dump ({} bytes at {:#x}):", len, self.base);

        let mut row = [0u8; 16];
        let mut offset = 0;
        while offset < len {
            let chunk = (len - offset).min(row.len());
            let address = self.base + offset as u32;
            self.store.read(address, &mut row[..chunk])?;
            debug!("{:#010x}: {:02x?}", address, &row[..chunk]);
            offset += chunk;
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_ready(&self) -> Result<(), StorageError> {
        match self.state {
            LogState::Ready => Ok(()),
            LogState::Uninitialized => Err(StorageError::NotInitialized),
            LogState::Corrupt { found } => Err(StorageError::InvalidPersistedState {
                found,
                capacity: self.capacity,
            }),
        }
    }

    fn read_committed(&mut self, index: u32) -> Result<SensorRecord, StorageError> {
        let address = self.record_address(index);
        let mut buf = [0u8; SensorRecord::SIZE];
        self.store.read(address, &mut buf).map_err(|e| {
            error!("Failed to read record {} at {:#x}: {:?}", index, address, e);
            StorageError::Nv(e)
        })?;

        // Padding is always programmed as zero, so a real record is never all 0xFF
        if buf.iter().all(|&b| b == ERASED_BYTE) {
            return Err(StorageError::ErasedRecord { index });
        }
        Ok(SensorRecord::from_bytes(&buf))
    }

    fn data_start(&self) -> u32 {
        self.base + self.page_size
    }

    fn record_address(&self, index: u32) -> u32 {
        self.data_start() + index * SensorRecord::SIZE as u32
    }

    fn align_down(&self, address: u32) -> u32 {
        (address / self.page_size) * self.page_size
    }

    fn align_up(&self, address: u32) -> u32 {
        address.div_ceil(self.page_size) * self.page_size
    }

    fn scan_journal(&self, page: &[u8]) -> JournalScan {
        let mut last: Option<(u32, u32)> = None;
        let mut seen_erased = false;

        for (slot, chunk) in page.chunks_exact(SLOT_SIZE as usize).enumerate() {
            let value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);

            if value == ERASED_WORD {
                seen_erased = true;
                continue;
            }

            // Programmed slot after a gap, above capacity, or going backwards
            if seen_erased || value > self.capacity {
                return JournalScan::Invalid { found: value };
            }
            if let Some((_, previous)) = last
                && value < previous
            {
                return JournalScan::Invalid { found: value };
            }

            last = Some((slot as u32, value));
        }

        match last {
            None => JournalScan::Erased,
            Some((slot, count)) => JournalScan::Committed { slot, count },
        }
    }

    /// Program `count` into the next journal slot and adopt it.
    fn commit_count(&mut self, count: u32) -> Result<(), StorageError> {
        let slots = self.page_size / SLOT_SIZE;
        let mut slot = self.journal_slot.map_or(0, |s| s + 1);

        if slot >= slots {
            debug!("Count journal full, erasing count page");
            self.journal_slot = None;
            self.erase(self.base, 1)?;
            slot = 0;
        }

        // Erased bytes program as no-ops, so only the target slot changes
        let mut image = vec![ERASED_BYTE; self.page_size as usize];
        let offset = (slot * SLOT_SIZE) as usize;
        image[offset..offset + SLOT_SIZE as usize].copy_from_slice(&count.to_le_bytes());
        self.program(self.base, &image)?;

        self.journal_slot = Some(slot);
        self.stored_count = count;
        Ok(())
    }

    /// Program `bytes` at the position of record `first_index`, preserving
    /// every committed byte that shares a page with them.
    fn write_records(&mut self, first_index: u32, bytes: &[u8]) -> Result<(), StorageError> {
        let start = self.record_address(first_index);
        let end = start + bytes.len() as u32;
        let page_start = self.align_down(start);
        let page_end = self.align_up(end);
        let pages = (page_end - page_start) / self.page_size;

        let mut image = vec![0u8; (page_end - page_start) as usize];
        self.store.read(page_start, &mut image).map_err(|e| {
            error!("Failed to read page image at {:#x}: {:?}", page_start, e);
            StorageError::Nv(e)
        })?;

        let head = (start - page_start) as usize;
        if image[head..].iter().any(|&b| b != ERASED_BYTE) {
            warn!(
                "Uncommitted bytes past record {} at {:#x}, rewriting {} page(s)",
                first_index, start, pages
            );
            image[head..].fill(ERASED_BYTE);
            self.erase(page_start, pages)?;
        }

        image[head..head + bytes.len()].copy_from_slice(bytes);
        self.program(page_start, &image)
    }

    fn program(&mut self, address: u32, data: &[u8]) -> Result<(), StorageError> {
        let store = &mut self.store;
        critical_section::with(|_| store.program_pages(address, data)).map_err(|e| {
            error!("Flash program of {} bytes at {:#x} failed: {:?}", data.len(), address, e);
            StorageError::Nv(e)
        })
    }

    fn erase(&mut self, address: u32, pages: u32) -> Result<(), StorageError> {
        let store = &mut self.store;
        critical_section::with(|_| store.erase_pages(address, pages)).map_err(|e| {
            error!("Flash erase of {} pages at {:#x} failed: {:?}", pages, address, e);
            StorageError::Nv(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RamFlash;

    const PAGE: u32 = 256;

    fn record(seed: u32) -> SensorRecord {
        let mut record = SensorRecord::default();
        record.temperature = 20.0 + seed as f32 * 0.25;
        record.humidity = 40.0 + seed as f32;
        record.pressure = 1000.0 + seed as f32 * 0.5;
        record.gas_resistance = 50_000.0 + seed as f32;
        record.pm2_5 = seed as u16;
        record.pm5 = seed as u16 + 1;
        record.pm10 = seed as u16 + 2;
        record.co2 = 400 + seed;
        record.latitude = 482_057_600 + seed as i32;
        record.longitude = 166_298_170 - seed as i32;
        record.timestamp = 1_706_745_600 + seed * 60;
        record
    }

    /// Small region: 4 pages, capacity (1024 - 256) / 40 = 19 records
    fn small_log() -> (RamFlash, RecordLog<RamFlash>) {
        let flash = RamFlash::new(0, 4 * PAGE, PAGE);
        let mut log = RecordLog::with_region(flash.clone(), 0, 4 * PAGE);
        log.init().unwrap();
        (flash, log)
    }

    fn reopen(flash: &RamFlash, region_size: u32) -> RecordLog<RamFlash> {
        let mut log = RecordLog::with_region(flash.clone(), 0, region_size);
        log.init().unwrap();
        log
    }

    #[test]
    fn test_default_region_capacity() {
        let log = RecordLog::new(RamFlash::for_record_region());
        assert_eq!(log.capacity(), 1632);
        assert_eq!(log.state(), LogState::Uninitialized);
    }

    #[test]
    fn test_erased_region_initializes_to_zero() {
        let flash = RamFlash::for_record_region();
        let mut log = RecordLog::new(flash.clone());

        log.init().unwrap();
        assert_eq!(log.stored_count(), 0);
        assert_eq!(flash.contents(STORAGE_BASE_OFFSET, 4), [0, 0, 0, 0]);

        // Second init adopts the zero instead of formatting again
        log.init().unwrap();
        assert_eq!(log.stored_count(), 0);
        assert_eq!(flash.program_count(), 1);
        assert!(log.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_use_before_init_is_rejected() {
        let mut log = RecordLog::with_region(RamFlash::new(0, 4 * PAGE, PAGE), 0, 4 * PAGE);
        assert_eq!(log.append(&record(1)), Err(StorageError::NotInitialized));
        assert_eq!(log.load_all(), Err(StorageError::NotInitialized));
    }

    #[test]
    fn test_append_then_load_returns_same_records() {
        let flash = RamFlash::for_record_region();
        let mut log = RecordLog::new(flash.clone());
        log.init().unwrap();

        let written: Vec<SensorRecord> = (0..25).map(record).collect();
        for r in &written {
            log.append(r).unwrap();
        }

        assert_eq!(log.stored_count(), 25);
        assert_eq!(log.load_all().unwrap(), written);

        let mut reopened = RecordLog::new(flash);
        reopened.init().unwrap();
        assert_eq!(reopened.load_all().unwrap(), written);
    }

    #[test]
    fn test_record_straddling_page_boundary() {
        let (_flash, mut log) = small_log();
        for seed in 0..8 {
            log.append(&record(seed)).unwrap();
        }

        // Record 6 covers data bytes 240..280, crossing the first data page
        assert_eq!(log.read_record(6).unwrap(), record(6));
        assert_eq!(log.read_record(7).unwrap(), record(7));
        assert_eq!(
            log.read_record(8),
            Err(StorageError::RecordOutOfRange { index: 8, count: 8 })
        );
    }

    #[test]
    fn test_capacity_boundary_rejects_without_mutation() {
        let (flash, mut log) = small_log();
        assert_eq!(log.capacity(), 19);

        for seed in 0..19 {
            log.append(&record(seed)).unwrap();
        }
        assert!(log.is_full());

        let before = flash.contents(0, 4 * PAGE as usize);
        assert_eq!(
            log.append(&record(99)),
            Err(StorageError::StorageFull { capacity: 19 })
        );
        assert_eq!(
            log.append_batch(&[record(99)]),
            Err(StorageError::StorageFull { capacity: 19 })
        );
        assert_eq!(log.stored_count(), 19);
        assert_eq!(flash.contents(0, 4 * PAGE as usize), before);
    }

    #[test]
    fn test_power_loss_before_count_commit_is_invisible() {
        let (flash, mut log) = small_log();
        for seed in 0..3 {
            log.append(&record(seed)).unwrap();
        }

        // Data page programs, count commit never happens
        flash.fail_after_programs(1);
        assert_eq!(
            log.append(&record(3)),
            Err(StorageError::Nv(NvError::PowerLoss))
        );
        assert_eq!(log.stored_count(), 3);

        flash.restore_power();
        let mut rebooted = reopen(&flash, 4 * PAGE);
        assert_eq!(rebooted.stored_count(), 3);
        assert_eq!(
            rebooted.load_all().unwrap(),
            [record(0), record(1), record(2)]
        );

        // The orphaned bytes are rewritten by the next append
        rebooted.append(&record(42)).unwrap();
        assert_eq!(rebooted.read_record(3).unwrap(), record(42));
        assert_eq!(rebooted.read_record(2).unwrap(), record(2));
        assert!(flash.erase_count(PAGE) > 0);
    }

    #[test]
    fn test_interrupted_orphan_rewrite_hides_erased_records() {
        let (flash, mut log) = small_log();
        for seed in 0..3 {
            log.append(&record(seed)).unwrap();
        }

        // Record 3 reaches flash but its count commit does not
        flash.fail_after_programs(1);
        assert!(log.append(&record(3)).is_err());
        flash.restore_power();

        // The rewrite erases the shared data page, then the program fails
        let mut rebooted = reopen(&flash, 4 * PAGE);
        flash.fail_programs_after(0);
        assert_eq!(
            rebooted.append(&record(4)),
            Err(StorageError::Nv(NvError::PowerLoss))
        );
        assert_eq!(flash.erase_count(PAGE), 1);
        flash.restore_power();

        let mut rebooted = reopen(&flash, 4 * PAGE);
        assert_eq!(rebooted.stored_count(), 3);
        assert!(rebooted.load_all().unwrap().is_empty());
        assert_eq!(
            rebooted.read_record(0),
            Err(StorageError::ErasedRecord { index: 0 })
        );

        // New records still land after the lost ones
        rebooted.append(&record(5)).unwrap();
        assert_eq!(rebooted.load_all().unwrap(), [record(5)]);
        assert_eq!(rebooted.read_record(3).unwrap(), record(5));
    }

    #[test]
    fn test_power_loss_before_data_program_keeps_state() {
        let (flash, mut log) = small_log();
        log.append(&record(0)).unwrap();

        flash.fail_after_programs(0);
        assert!(log.append(&record(1)).is_err());

        flash.restore_power();
        let mut rebooted = reopen(&flash, 4 * PAGE);
        assert_eq!(rebooted.load_all().unwrap(), [record(0)]);
    }

    #[test]
    fn test_count_above_capacity_is_reported() {
        let flash = RamFlash::new(0, 4 * PAGE, PAGE);
        flash.inject_corruption(0, &20u32.to_le_bytes());

        let mut log = RecordLog::with_region(flash.clone(), 0, 4 * PAGE);
        assert_eq!(
            log.init(),
            Err(StorageError::InvalidPersistedState {
                found: 20,
                capacity: 19
            })
        );
        assert_eq!(log.stored_count(), 0);
        assert_eq!(log.state(), LogState::Corrupt { found: 20 });
        assert!(log.append(&record(0)).is_err());

        log.erase_all().unwrap();
        log.append(&record(0)).unwrap();
        assert_eq!(reopen(&flash, 4 * PAGE).stored_count(), 1);
    }

    #[test]
    fn test_decreasing_journal_is_invalid() {
        let flash = RamFlash::new(0, 4 * PAGE, PAGE);
        let mut corrupt = [0u8; 8];
        corrupt[..4].copy_from_slice(&5u32.to_le_bytes());
        corrupt[4..].copy_from_slice(&3u32.to_le_bytes());
        flash.inject_corruption(0, &corrupt);

        let mut log = RecordLog::with_region(flash, 0, 4 * PAGE);
        assert_eq!(
            log.init(),
            Err(StorageError::InvalidPersistedState {
                found: 3,
                capacity: 19
            })
        );
    }

    #[test]
    fn test_batch_packs_contiguously() {
        let (flash, mut log) = small_log();
        log.append(&record(0)).unwrap();

        let batch: Vec<SensorRecord> = (1..9).map(record).collect();
        log.append_batch(&batch).unwrap();
        assert_eq!(log.stored_count(), 9);

        let mut expected = alloc::vec![record(0)];
        expected.extend_from_slice(&batch);
        assert_eq!(log.load_all().unwrap(), expected);

        // 9 records end at data byte 360; the rest of that page stays erased
        let tail = flash.contents(PAGE + 360, (2 * PAGE - 360) as usize);
        assert!(tail.iter().all(|&b| b == 0xFF));

        let mut rebooted = reopen(&flash, 4 * PAGE);
        assert_eq!(rebooted.stored_count(), 9);
        assert_eq!(rebooted.load_all().unwrap().len(), 9);
    }

    #[test]
    fn test_batch_over_capacity_is_rejected() {
        let (_flash, mut log) = small_log();
        let batch: Vec<SensorRecord> = (0..20).map(record).collect();
        assert_eq!(
            log.append_batch(&batch),
            Err(StorageError::StorageFull { capacity: 19 })
        );
        assert_eq!(log.stored_count(), 0);
        log.append_batch(&[]).unwrap();
    }

    #[test]
    fn test_count_journal_rolls_over() {
        let region = 16 * PAGE;
        let flash = RamFlash::new(0, region, PAGE);
        let mut log = RecordLog::with_region(flash.clone(), 0, region);
        log.init().unwrap();

        // Slot 0 holds the initial zero, so the 64th append wraps the journal
        for seed in 0..70 {
            log.append(&record(seed)).unwrap();
        }
        assert_eq!(flash.erase_count(0), 1);

        let mut rebooted = reopen(&flash, region);
        assert_eq!(rebooted.stored_count(), 70);
        assert_eq!(rebooted.read_record(69).unwrap(), record(69));
    }

    #[test]
    fn test_power_loss_during_journal_rollover_drops_records() {
        let region = 16 * PAGE;
        let flash = RamFlash::new(0, region, PAGE);
        let mut log = RecordLog::with_region(flash.clone(), 0, region);
        log.init().unwrap();
        for seed in 0..63 {
            log.append(&record(seed)).unwrap();
        }

        // Data program succeeds, the count page is erased, slot 0 never lands
        flash.fail_programs_after(1);
        assert_eq!(
            log.append(&record(63)),
            Err(StorageError::Nv(NvError::PowerLoss))
        );
        assert_eq!(flash.erase_count(0), 1);
        flash.restore_power();

        let mut rebooted = reopen(&flash, region);
        assert_eq!(rebooted.stored_count(), 0);
        assert!(rebooted.load_all().unwrap().is_empty());

        // The old record bytes are orphans now and get rewritten
        rebooted.append(&record(100)).unwrap();
        assert_eq!(rebooted.load_all().unwrap(), [record(100)]);
    }

    #[test]
    fn test_erase_all_resets_region() {
        let (flash, mut log) = small_log();
        for seed in 0..10 {
            log.append(&record(seed)).unwrap();
        }

        log.reset().unwrap();
        assert_eq!(log.stored_count(), 0);
        assert!(log.load_all().unwrap().is_empty());
        assert!(flash.contents(PAGE, 400).iter().all(|&b| b == 0xFF));
        assert_eq!(reopen(&flash, 4 * PAGE).stored_count(), 0);

        log.append(&record(5)).unwrap();
        assert_eq!(log.load_all().unwrap(), [record(5)]);
    }

    #[test]
    fn test_dump_raw_reads_region() {
        let (_flash, mut log) = small_log();
        log.append(&record(1)).unwrap();
        log.dump_raw(100).unwrap();
    }
}
