//! In-process region and event
//!
//! `MemoryRegion` and `MemoryEvent` are cheap `Arc` handles, so a producer
//! and a connection can each hold a clone of the same buffer and event.

use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

use super::{DataEvent, SharedRegion, WaitResult, checked_range};
use crate::Result;

/// Heap-backed telemetry region.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegion {
    bytes: Arc<RwLock<Vec<u8>>>,
}

impl MemoryRegion {
    /// Zero-filled region of `len` bytes.
    pub fn new(len: usize) -> Self {
        Self::from_bytes(vec![0; len])
    }

    /// Wrap an existing image, e.g. a dump of a live region.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes: Arc::new(RwLock::new(bytes)) }
    }

    /// Overwrite bytes at `offset`.
    pub fn write(&self, offset: usize, src: &[u8]) -> Result<()> {
        let mut bytes = self.bytes.write();
        let end = checked_range(offset, src.len(), bytes.len())?;
        bytes[offset..end].copy_from_slice(src);
        Ok(())
    }

    /// Write a little-endian `i32` at `offset`.
    pub fn write_i32(&self, offset: usize, value: i32) -> Result<()> {
        self.write(offset, &value.to_le_bytes())
    }

    /// Copy of the whole image.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }
}

impl SharedRegion for MemoryRegion {
    fn len(&self) -> usize {
        self.bytes.read().len()
    }

    fn copy_to(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let bytes = self.bytes.read();
        let end = checked_range(offset, dst.len(), bytes.len())?;
        dst.copy_from_slice(&bytes[offset..end]);
        Ok(())
    }
}

/// Auto-reset event: one [`signal`](Self::signal) releases one wait.
#[derive(Debug, Clone, Default)]
pub struct MemoryEvent {
    inner: Arc<EventInner>,
}

#[derive(Debug, Default)]
struct EventInner {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl MemoryEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event and wake one waiter.
    pub fn signal(&self) {
        let mut signaled = self.inner.signaled.lock();
        *signaled = true;
        self.inner.cond.notify_one();
    }
}

impl DataEvent for MemoryEvent {
    fn wait(&self, timeout: Duration) -> Result<WaitResult> {
        let mut signaled = self.inner.signaled.lock();
        match Instant::now().checked_add(timeout) {
            Some(deadline) => {
                while !*signaled {
                    if self.inner.cond.wait_until(&mut signaled, deadline).timed_out() {
                        break;
                    }
                }
            }
            // No representable deadline: wait until signaled.
            None => {
                while !*signaled {
                    self.inner.cond.wait(&mut signaled);
                }
            }
        }

        if *signaled {
            *signaled = false;
            trace!("Memory event signaled");
            Ok(WaitResult::Signaled)
        } else {
            trace!("Memory event wait timed out");
            Ok(WaitResult::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_bytes() {
        let region = MemoryRegion::new(16);
        let producer = region.clone();
        producer.write_i32(8, 42).unwrap();
        assert_eq!(region.read_i32(8).unwrap(), 42);
        assert_eq!(region.len(), 16);
    }

    #[test]
    fn out_of_bounds_write_fails() {
        let region = MemoryRegion::new(4);
        assert!(region.write(2, &[0; 4]).is_err());
        assert_eq!(region.to_vec(), vec![0; 4]);
    }

    #[test]
    fn signal_before_wait_is_consumed_once() {
        let event = MemoryEvent::new();
        event.signal();
        assert_eq!(event.wait(Duration::from_millis(1)).unwrap(), WaitResult::Signaled);
        assert_eq!(event.wait(Duration::from_millis(1)).unwrap(), WaitResult::Timeout);
    }

    #[test]
    fn signal_from_another_thread_wakes_waiter() {
        let event = MemoryEvent::new();
        let producer = event.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            producer.signal();
        });
        let result = event.wait(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert_eq!(result, WaitResult::Signaled);
    }

    #[test]
    fn unbounded_wait_blocks_until_signaled() {
        let event = MemoryEvent::new();
        event.signal();
        assert_eq!(event.wait(Duration::MAX).unwrap(), WaitResult::Signaled);

        let producer = event.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            producer.signal();
        });
        assert_eq!(event.wait(Duration::MAX).unwrap(), WaitResult::Signaled);
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out_close_to_budget() {
        let event = MemoryEvent::new();
        let start = Instant::now();
        assert_eq!(event.wait(Duration::from_millis(20)).unwrap(), WaitResult::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
