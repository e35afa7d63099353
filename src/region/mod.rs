//! Shared region access
//!
//! The simulator publishes telemetry through two named kernel objects: a
//! read-only memory mapping and an event it signals after each new row. This
//! module puts both behind small traits so the reader and parser work the
//! same over a live Windows mapping or an in-process [`MemoryRegion`].
//!
//! Reads always copy out of the region. The producer writes concurrently, so
//! no reference into the mapping is ever handed out.

mod memory;
#[cfg(windows)]
mod win32;

use std::time::Duration;

use crate::Result;
use crate::config::ReaderConfig;

pub use memory::{MemoryEvent, MemoryRegion};
#[cfg(windows)]
pub use win32::{MappedRegion, NamedEvent, NamedObjects};

/// Read-only view of the telemetry region.
pub trait SharedRegion {
    /// Size of the mapped region in bytes.
    fn len(&self) -> usize;

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    ///
    /// Fails with [`TelemetryError::Memory`](crate::TelemetryError::Memory)
    /// when the range falls outside the region.
    fn copy_to(&self, offset: usize, dst: &mut [u8]) -> Result<()>;

    /// Whether the region is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a little-endian `i32` at `offset`.
    fn read_i32(&self, offset: usize) -> Result<i32> {
        let mut bytes = [0u8; 4];
        self.copy_to(offset, &mut bytes)?;
        Ok(i32::from_le_bytes(bytes))
    }
}

/// Result of waiting for data updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Signaled,
    Timeout,
}

/// Event signalled by the producer when a new row is available.
pub trait DataEvent {
    /// Block for at most `timeout` waiting for the producer's signal.
    fn wait(&self, timeout: Duration) -> Result<WaitResult>;
}

/// Opens the region and event pair for a connection.
///
/// Each call must return fresh handles; a connection never shares them.
pub trait RegionSource {
    type Region: SharedRegion;
    type Event: DataEvent;

    /// Open both objects, or fail with
    /// [`TelemetryError::ResourceNotFound`](crate::TelemetryError::ResourceNotFound).
    fn open(&self, config: &ReaderConfig) -> Result<(Self::Region, Self::Event)>;
}

/// Source of the simulator's live objects on this platform.
#[cfg(windows)]
pub type LiveSource = NamedObjects;

/// Source of the simulator's live objects on this platform.
#[cfg(not(windows))]
pub type LiveSource = UnsupportedSource;

/// Stand-in source for platforms without the simulator; every open fails
/// with [`TelemetryError::UnsupportedPlatform`](crate::TelemetryError::UnsupportedPlatform).
#[cfg(not(windows))]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedSource;

#[cfg(not(windows))]
impl RegionSource for UnsupportedSource {
    type Region = MemoryRegion;
    type Event = MemoryEvent;

    fn open(&self, _config: &ReaderConfig) -> Result<(MemoryRegion, MemoryEvent)> {
        Err(crate::TelemetryError::unsupported_platform("Live telemetry", "Windows"))
    }
}

/// Bounds check shared by region implementations.
pub(crate) fn checked_range(offset: usize, len: usize, region_len: usize) -> Result<usize> {
    match offset.checked_add(len) {
        Some(end) if end <= region_len => Ok(end),
        _ => Err(crate::TelemetryError::memory_access_error(offset)),
    }
}
