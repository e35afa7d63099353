//! Named Windows mapping and event published by iRacing

use std::ptr::NonNull;
use std::sync::atomic::{Ordering, fence};
use std::time::Duration;
use tracing::{debug, trace};
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0, WAIT_TIMEOUT};
use windows::Win32::System::Memory::{
    FILE_MAP_READ, MEMORY_BASIC_INFORMATION, MEMORY_MAPPED_VIEW_ADDRESS, MapViewOfFile,
    OpenFileMappingW, UnmapViewOfFile, VirtualQuery,
};
use windows::Win32::System::Threading::{
    OpenEventW, SYNCHRONIZATION_ACCESS_RIGHTS, WaitForSingleObject,
};
use windows::core::PCWSTR;

use super::{DataEvent, RegionSource, SharedRegion, WaitResult, checked_range};
use crate::config::ReaderConfig;
use crate::{Result, TelemetryError};

/// SYNCHRONIZE access right
const SYNCHRONIZE: u32 = 0x0010_0000;

/// Read-only view of the simulator's shared memory mapping.
pub struct MappedRegion {
    mapping: HANDLE,
    base: NonNull<u8>,
    len: usize,
}

impl MappedRegion {
    /// Open the named mapping and map the whole region.
    pub fn open(name: &str) -> Result<Self> {
        trace!(name, "Opening shared memory mapping");

        let wide_name = wide_string(name);
        let mapping = unsafe {
            OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR::from_raw(wide_name.as_ptr()))
                .map_err(|e| TelemetryError::resource_not_found_with_source(name, Box::new(e)))?
        };

        let view = unsafe { MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, 0) };
        let Some(base) = NonNull::new(view.Value as *mut u8) else {
            let win_err = windows::core::Error::from_thread();
            unsafe {
                let _ = CloseHandle(mapping);
            }
            return Err(TelemetryError::windows_api_error("MapViewOfFile", win_err));
        };

        // The view length is not returned by MapViewOfFile; ask the VM manager.
        let mut info = MEMORY_BASIC_INFORMATION::default();
        let written = unsafe {
            VirtualQuery(
                Some(base.as_ptr() as *const _),
                &mut info,
                std::mem::size_of::<MEMORY_BASIC_INFORMATION>(),
            )
        };
        if written == 0 {
            let win_err = windows::core::Error::from_thread();
            unsafe {
                let _ = UnmapViewOfFile(view);
                let _ = CloseHandle(mapping);
            }
            return Err(TelemetryError::windows_api_error("VirtualQuery", win_err));
        }

        debug!(name, len = info.RegionSize, "Mapped shared memory region");
        Ok(Self { mapping, base, len: info.RegionSize })
    }
}

impl SharedRegion for MappedRegion {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_to(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        checked_range(offset, dst.len(), self.len)?;
        fence(Ordering::Acquire);
        // SAFETY: the range was bounds-checked against the mapped view, which
        // stays mapped until drop. The producer may write concurrently, so the
        // bytes are copied out rather than borrowed.
        unsafe {
            let src = self.base.as_ptr().add(offset);
            if dst.len() == 4 {
                let word = std::ptr::read_volatile(src as *const [u8; 4]);
                dst.copy_from_slice(&word);
            } else {
                std::ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len());
            }
        }
        fence(Ordering::Acquire);
        Ok(())
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        debug!("Unmapping shared memory region");
        unsafe {
            let addr = MEMORY_MAPPED_VIEW_ADDRESS { Value: self.base.as_ptr() as *mut _ };
            let _ = UnmapViewOfFile(addr);
            let _ = CloseHandle(self.mapping);
        }
    }
}

// SAFETY: the view is only ever read through bounds-checked copies
unsafe impl Send for MappedRegion {}

/// The simulator's data-valid event, opened with SYNCHRONIZE access only.
pub struct NamedEvent {
    handle: HANDLE,
}

impl NamedEvent {
    /// Open the named event.
    pub fn open(name: &str) -> Result<Self> {
        trace!(name, "Opening data valid event");
        let wide_name = wide_string(name);
        let handle = unsafe {
            OpenEventW(
                SYNCHRONIZATION_ACCESS_RIGHTS(SYNCHRONIZE),
                false,
                PCWSTR::from_raw(wide_name.as_ptr()),
            )
            .map_err(|e| TelemetryError::resource_not_found_with_source(name, Box::new(e)))?
        };
        Ok(Self { handle })
    }
}

impl DataEvent for NamedEvent {
    fn wait(&self, timeout: Duration) -> Result<WaitResult> {
        let ms = timeout.as_millis().min(u32::MAX as u128) as u32;
        trace!(timeout_ms = ms, "Waiting for telemetry update");

        let result = unsafe { WaitForSingleObject(self.handle, ms) };

        match result {
            WAIT_OBJECT_0 => Ok(WaitResult::Signaled),
            WAIT_TIMEOUT => Ok(WaitResult::Timeout),
            _ => {
                let win_err = windows::core::Error::from_thread();
                Err(TelemetryError::windows_api_error("WaitForSingleObject", win_err))
            }
        }
    }
}

impl Drop for NamedEvent {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

// SAFETY: kernel event handles may be waited on from any thread
unsafe impl Send for NamedEvent {}

/// Opens the mapping and event named in the [`ReaderConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedObjects;

impl RegionSource for NamedObjects {
    type Region = MappedRegion;
    type Event = NamedEvent;

    fn open(&self, config: &ReaderConfig) -> Result<(MappedRegion, NamedEvent)> {
        let region = MappedRegion::open(&config.memmap_name)?;
        let event = NamedEvent::open(&config.event_name)?;
        Ok((region, event))
    }
}

/// Convert string to null-terminated wide string for Windows APIs
fn wide_string(s: &str) -> Vec<u16> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

#[cfg(all(test, windows))]
mod tests {
    use super::*;
    use crate::config::{IRSDK_DATAVALIDEVENTNAME, IRSDK_MEMMAPFILENAME};

    #[test]
    fn missing_mapping_is_resource_not_found() {
        let result = MappedRegion::open("Local\\IrsdkPollDoesNotExist");
        assert!(matches!(result, Err(TelemetryError::ResourceNotFound { .. })));
    }

    #[test]
    fn wide_string_is_nul_terminated() {
        let wide = wide_string("ab");
        assert_eq!(wide, vec![b'a' as u16, b'b' as u16, 0]);
    }

    #[test]
    #[ignore = "iracing_required"]
    fn opens_live_objects() {
        let region = MappedRegion::open(IRSDK_MEMMAPFILENAME).expect("iRacing mapping");
        assert!(region.len() >= crate::header::HEADER_SIZE);
        let event = NamedEvent::open(IRSDK_DATAVALIDEVENTNAME).expect("iRacing event");
        event.wait(Duration::from_millis(100)).expect("wait");
    }
}
