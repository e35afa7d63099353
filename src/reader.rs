//! Snapshot reader.
//!
//! The producer writes rows round-robin into up to four slots and stamps each
//! with a tick count. A poll picks the slot with the greatest tick and copies
//! it out, re-reading the slot's tick afterwards: if it moved, the producer
//! overwrote the slot mid-copy and the copy is retried.
//!
//! The reader keeps one piece of state, the tick of the last row it handed
//! out. A tick lower than that one means the producer restarted; the reader
//! adopts the new tick without reporting data so the next row is picked up
//! normally.

use std::sync::atomic::{Ordering, fence};
use std::time::SystemTime;
use tracing::{debug, trace, warn};

use crate::header::{BufferSlot, TelemetryHeader};
use crate::region::SharedRegion;
use crate::{Result, TelemetryError};

/// What a single poll observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A row newer than the last one was copied (or, for a peek, observed).
    NewData { tick: i32, slot: usize },
    /// The freshest row is the one already reported.
    NoChange,
    /// The status flag is clear; reader state was reset.
    Disconnected,
    /// The freshest tick went backwards; the reader adopted it.
    Resynchronized { previous: i32, tick: i32 },
    /// Every copy attempt was overwritten mid-copy.
    Torn { attempts: u32 },
}

impl PollOutcome {
    /// Whether the poll produced a row.
    pub fn is_new(&self) -> bool {
        matches!(self, PollOutcome::NewData { .. })
    }
}

/// Change detection state for one connection.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    /// `None` until a row has been observed, and again after a disconnect.
    last_tick_count: Option<i32>,
    last_valid_time: Option<SystemTime>,
    max_copy_attempts: u32,
}

impl Default for SnapshotReader {
    fn default() -> Self {
        Self::new(2)
    }
}

impl SnapshotReader {
    /// Reader that retries a torn copy up to `max_copy_attempts` times in total.
    ///
    /// Zero is raised to one: every poll makes at least one copy attempt.
    /// [`ReaderConfig::validate`](crate::ReaderConfig::validate) rejects zero
    /// instead, so a [`Connection`](crate::Connection) never relies on this.
    pub fn new(max_copy_attempts: u32) -> Self {
        Self {
            last_tick_count: None,
            last_valid_time: None,
            max_copy_attempts: max_copy_attempts.max(1),
        }
    }

    /// Tick of the last row reported, if any.
    pub fn last_tick_count(&self) -> Option<i32> {
        self.last_tick_count
    }

    /// Wall-clock time of the last successful poll.
    pub fn last_valid_time(&self) -> Option<SystemTime> {
        self.last_valid_time
    }

    /// Forget the last tick so the next row is reported as new.
    pub fn reset(&mut self) {
        self.last_tick_count = None;
    }

    /// Poll for a row newer than the last one.
    ///
    /// With `dst`, the row is copied into its first `buffer_len` bytes. Without
    /// it, the freshest tick is recorded and reported without copying.
    pub fn poll<R: SharedRegion + ?Sized>(
        &mut self,
        region: &R,
        dst: Option<&mut [u8]>,
    ) -> Result<bool> {
        Ok(self.poll_outcome(region, dst)?.is_new())
    }

    /// [`poll`](Self::poll) with the reason spelled out.
    pub fn poll_outcome<R: SharedRegion + ?Sized>(
        &mut self,
        region: &R,
        dst: Option<&mut [u8]>,
    ) -> Result<PollOutcome> {
        let header = TelemetryHeader::read_from(region)?;

        if !header.is_connected() {
            if self.last_tick_count.take().is_some() {
                debug!("Producer disconnected, resetting reader");
            }
            return Ok(PollOutcome::Disconnected);
        }

        header.validate_buffers()?;

        let slot = header.freshest_slot();
        let latest = header.slots[slot];

        match self.last_tick_count {
            Some(last) if last == latest.tick_count => {
                trace!(tick = last, "No new data (same tick count)");
                return Ok(PollOutcome::NoChange);
            }
            Some(last) if last > latest.tick_count => {
                debug!(
                    previous = last,
                    tick = latest.tick_count,
                    "Tick count went backwards, resynchronizing"
                );
                self.last_tick_count = Some(latest.tick_count);
                return Ok(PollOutcome::Resynchronized { previous: last, tick: latest.tick_count });
            }
            _ => {}
        }

        let Some(dst) = dst else {
            self.commit(latest.tick_count);
            return Ok(PollOutcome::NewData { tick: latest.tick_count, slot });
        };

        let row_len = header.buffer_len as usize;
        let available = dst.len();
        let Some(dst) = dst.get_mut(..row_len) else {
            return Err(TelemetryError::buffer_operation_error(
                format!("Destination holds {} bytes, row needs {}", available, row_len),
                Some(slot),
            ));
        };

        let tick_offset = BufferSlot::tick_count_offset(slot);
        for attempt in 1..=self.max_copy_attempts {
            let tick_before = region.read_i32(tick_offset)?;
            fence(Ordering::Acquire);
            region.copy_to(latest.buffer_offset as usize, dst)?;
            fence(Ordering::Acquire);
            let tick_after = region.read_i32(tick_offset)?;

            if tick_before == tick_after {
                self.commit(tick_before);
                trace!(tick = tick_before, slot, bytes = row_len, "Copied new row");
                return Ok(PollOutcome::NewData { tick: tick_before, slot });
            }

            debug!(attempt, slot, tick_before, tick_after, "Row overwritten during copy");
        }

        warn!(slot, attempts = self.max_copy_attempts, "Row copy torn on every attempt");
        Ok(PollOutcome::Torn { attempts: self.max_copy_attempts })
    }

    fn commit(&mut self, tick: i32) {
        self.last_tick_count = Some(tick);
        self.last_valid_time = Some(SystemTime::now());
    }
}
