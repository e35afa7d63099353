//! Telemetry Header Decoding
//!
//! The region starts with the SDK's `irsdk_header`:
//! ```c
//! typedef struct irsdk_header
//! {
//!     int ver;                    // api version, 2 for current clients
//!     int status;                 // bitfield, 0x1 = connected
//!     int tickRate;               // ticks per second (60 or 360 etc)
//!     int sessionInfoUpdate;      // incremented when session info changes
//!     int sessionInfoLen;         // length in bytes of session info string
//!     int sessionInfoOffset;      // offset to session info string
//!     int numVars;                // length of irsdk_varHeader array
//!     int varHeaderOffset;        // offset to irsdk_varHeader[0]
//!     int numBuf;                 // <= IRSDK_MAX_BUFS
//!     int bufLen;                 // length in bytes of one row
//!     int pad1[2];
//!     irsdk_varBuf varBuf[4];     // { tickCount, bufOffset, pad[2] }
//! } irsdk_header;
//! ```
//!
//! 112 bytes in total. Fields are decoded from a byte copy with explicit
//! little-endian reads; nothing is cast in place, because the producer keeps
//! writing while the reader decodes.
//!
//! The header is re-read on every poll. Slot tick counts change at the tick
//! rate, and the producer may move buffers across reconnects.

use tracing::trace;

use crate::region::SharedRegion;
use crate::{Result, TelemetryError};

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = 112;
/// Maximum number of row buffers.
pub const IRSDK_MAX_BUFS: usize = 4;
/// Status flag indicating that the simulator is actively publishing telemetry.
pub const IRSDK_STATUS_CONNECTED: i32 = 0x1;

const SLOTS_OFFSET: usize = 48;
const SLOT_SIZE: usize = 16;

/// One row buffer descriptor (`irsdk_varBuf`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferSlot {
    /// Tick stamped by the producer when the row was written
    pub tick_count: i32,
    /// Absolute offset of the row from the start of the region
    pub buffer_offset: i32,
}

impl BufferSlot {
    /// Region offset of slot `index`'s tick count.
    pub const fn tick_count_offset(index: usize) -> usize {
        SLOTS_OFFSET + index * SLOT_SIZE
    }

    /// Region offset of slot `index`'s buffer offset.
    pub const fn buffer_offset_offset(index: usize) -> usize {
        SLOTS_OFFSET + index * SLOT_SIZE + 4
    }
}

/// Decoded `irsdk_header`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TelemetryHeader {
    pub version: i32,
    pub status: i32,
    pub tick_rate: i32,
    pub session_info_update: i32,
    pub session_info_len: i32,
    pub session_info_offset: i32,
    pub num_vars: i32,
    pub var_header_offset: i32,
    pub num_buffers: i32,
    pub buffer_len: i32,
    pub slots: [BufferSlot; IRSDK_MAX_BUFS],
}

fn field(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

impl TelemetryHeader {
    /// Decode a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(TelemetryError::memory_access_error(bytes.len()));
        }

        let mut slots = [BufferSlot::default(); IRSDK_MAX_BUFS];
        for (index, slot) in slots.iter_mut().enumerate() {
            slot.tick_count = field(bytes, BufferSlot::tick_count_offset(index));
            slot.buffer_offset = field(bytes, BufferSlot::buffer_offset_offset(index));
        }

        Ok(Self {
            version: field(bytes, 0),
            status: field(bytes, 4),
            tick_rate: field(bytes, 8),
            session_info_update: field(bytes, 12),
            session_info_len: field(bytes, 16),
            session_info_offset: field(bytes, 20),
            num_vars: field(bytes, 24),
            var_header_offset: field(bytes, 28),
            num_buffers: field(bytes, 32),
            buffer_len: field(bytes, 36),
            slots,
        })
    }

    /// Copy the header out of the region and decode it.
    pub fn read_from<R: SharedRegion + ?Sized>(region: &R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        region.copy_to(0, &mut bytes)?;
        let header = Self::decode(&bytes)?;
        trace!(
            status = header.status,
            num_buffers = header.num_buffers,
            session_info_update = header.session_info_update,
            "Read telemetry header"
        );
        Ok(header)
    }

    /// Encode into the on-wire layout. Padding is zeroed.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let fields = [
            self.version,
            self.status,
            self.tick_rate,
            self.session_info_update,
            self.session_info_len,
            self.session_info_offset,
            self.num_vars,
            self.var_header_offset,
            self.num_buffers,
            self.buffer_len,
        ];
        for (index, value) in fields.iter().enumerate() {
            bytes[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        for (index, slot) in self.slots.iter().enumerate() {
            let tick = BufferSlot::tick_count_offset(index);
            let offset = BufferSlot::buffer_offset_offset(index);
            bytes[tick..tick + 4].copy_from_slice(&slot.tick_count.to_le_bytes());
            bytes[offset..offset + 4].copy_from_slice(&slot.buffer_offset.to_le_bytes());
        }
        bytes
    }

    /// Returns true when the simulator reports the feed is live.
    pub fn is_connected(&self) -> bool {
        (self.status & IRSDK_STATUS_CONNECTED) != 0
    }

    /// Check the buffer fields the reader depends on.
    pub fn validate_buffers(&self) -> Result<()> {
        if self.num_buffers < 1 || self.num_buffers > IRSDK_MAX_BUFS as i32 {
            return Err(TelemetryError::parse_error(
                "Header validation",
                format!("Expected 1-4 buffers, found {}", self.num_buffers),
            ));
        }

        if self.buffer_len <= 0 {
            return Err(TelemetryError::parse_error(
                "Header validation",
                format!("Invalid buffer length: {}", self.buffer_len),
            ));
        }

        for (index, slot) in self.active_slots().iter().enumerate() {
            if slot.buffer_offset < HEADER_SIZE as i32 {
                return Err(TelemetryError::parse_error(
                    "Buffer validation",
                    format!("Buffer {} has invalid offset: {}", index, slot.buffer_offset),
                ));
            }
        }

        Ok(())
    }

    /// Check the variable table and session info ranges.
    pub fn validate_tables(&self) -> Result<()> {
        if self.num_vars < 0 || self.var_header_offset < 0 {
            return Err(TelemetryError::parse_error(
                "Header validation",
                format!(
                    "Invalid variable table: num_vars={}, offset={}",
                    self.num_vars, self.var_header_offset
                ),
            ));
        }

        if self.session_info_len < 0 || self.session_info_offset < 0 {
            return Err(TelemetryError::parse_error(
                "Header validation",
                format!(
                    "Invalid session info: len={}, offset={}",
                    self.session_info_len, self.session_info_offset
                ),
            ));
        }

        Ok(())
    }

    /// The first `num_buffers` slots, clamped to `[0, 4]`.
    pub fn active_slots(&self) -> &[BufferSlot] {
        let count = self.num_buffers.clamp(0, IRSDK_MAX_BUFS as i32) as usize;
        &self.slots[..count]
    }

    /// Index of the slot with the greatest tick count.
    ///
    /// Ties resolve to the lowest index. Returns 0 when no slot is active.
    pub fn freshest_slot(&self) -> usize {
        let slots = self.active_slots();
        let mut latest = 0;
        for index in 1..slots.len() {
            if slots[latest].tick_count < slots[index].tick_count {
                latest = index;
            }
        }
        latest
    }

    /// Check if session info has been updated since `last_update`.
    pub fn session_info_changed(&self, last_update: i32) -> bool {
        self.session_info_update != last_update
    }
}
