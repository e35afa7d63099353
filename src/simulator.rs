//! In-process producer.
//!
//! Builds a region image with the same layout the simulator publishes and
//! writes rows into it the way the simulator does: row first, then the slot's
//! tick, then the event signal. Used by the test suite and benchmarks, and
//! for developing consumers away from Windows.
//!
//! ```rust
//! use irsdk_poll::simulator::RegionLayout;
//! use irsdk_poll::types::VariableType;
//! use irsdk_poll::{Connection, ReaderConfig};
//!
//! # fn main() -> irsdk_poll::Result<()> {
//! let mut producer = RegionLayout::new(3)
//!     .variable("Speed", VariableType::Float, 1, "m/s", "GPS vehicle speed")
//!     .build()?;
//! let mut connection =
//!     Connection::from_parts(producer.region(), producer.event(), ReaderConfig::default())?;
//!
//! let row = producer.row().set("Speed", 42.0f32)?.build();
//! producer.publish(&row)?;
//! let mut row = vec![0u8; connection.row_len()?];
//! assert!(connection.poll(Some(&mut row))?);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use crate::config::{IRSDK_VER, ReaderConfig};
use crate::header::{
    BufferSlot, HEADER_SIZE, IRSDK_MAX_BUFS, IRSDK_STATUS_CONNECTED, TelemetryHeader,
};
use crate::region::{MemoryEvent, MemoryRegion, RegionSource};
use crate::types::{BitField, VariableType};
use crate::variables::{VAR_HEADER_SIZE, VariableDescriptor};
use crate::{Result, TelemetryError};

const SESSION_INFO_UPDATE_OFFSET: usize = 12;
const STATUS_OFFSET: usize = 4;
const ALIGN: usize = 16;

fn align(value: usize) -> usize {
    value.div_ceil(ALIGN) * ALIGN
}

/// Region image builder.
#[derive(Debug, Clone)]
pub struct RegionLayout {
    version: i32,
    tick_rate: i32,
    num_buffers: usize,
    variables: Vec<VariableDescriptor>,
    row_len: usize,
    session_text: String,
    session_capacity: usize,
}

impl RegionLayout {
    /// Layout with `num_buffers` row slots, no variables and an empty session.
    pub fn new(num_buffers: usize) -> Self {
        Self {
            version: IRSDK_VER,
            tick_rate: 60,
            num_buffers,
            variables: Vec::new(),
            row_len: 0,
            session_text: String::new(),
            session_capacity: 4096,
        }
    }

    pub fn version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn tick_rate(mut self, tick_rate: i32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Append a variable; it is placed right after the previous one.
    pub fn variable(
        mut self,
        name: &str,
        data_type: VariableType,
        count: usize,
        unit: &str,
        description: &str,
    ) -> Self {
        self.variables.push(VariableDescriptor {
            name: name.to_string(),
            description: description.to_string(),
            unit: unit.to_string(),
            type_tag: data_type.raw(),
            data_type: Some(data_type),
            offset: self.row_len,
            count,
            count_as_time: false,
        });
        self.row_len += data_type.size() * count;
        self
    }

    /// Initial session document.
    pub fn session_text(mut self, text: &str) -> Self {
        self.session_text = text.to_string();
        self
    }

    /// Bytes reserved for session text, terminator included.
    pub fn session_capacity(mut self, bytes: usize) -> Self {
        self.session_capacity = bytes;
        self
    }

    /// Write the image and return a producer over it.
    ///
    /// The status flag starts clear; the first publish sets it.
    pub fn build(self) -> Result<Producer> {
        if !(1..=IRSDK_MAX_BUFS).contains(&self.num_buffers) {
            return Err(TelemetryError::parse_error(
                "Region layout",
                format!("Expected 1-4 buffers, got {}", self.num_buffers),
            ));
        }

        let var_header_offset = HEADER_SIZE;
        let session_info_offset = var_header_offset + self.variables.len() * VAR_HEADER_SIZE;
        let session_capacity = self.session_capacity.max(self.session_text.len() + 1);
        let buffer_len = self.row_len.max(1);
        let first_buffer = align(session_info_offset + session_capacity);
        let stride = align(buffer_len);
        let total = first_buffer + stride * self.num_buffers;

        let mut header = TelemetryHeader {
            version: self.version,
            status: 0,
            tick_rate: self.tick_rate,
            session_info_update: 0,
            session_info_len: session_capacity as i32,
            session_info_offset: session_info_offset as i32,
            num_vars: self.variables.len() as i32,
            var_header_offset: var_header_offset as i32,
            num_buffers: self.num_buffers as i32,
            buffer_len: buffer_len as i32,
            slots: [BufferSlot::default(); IRSDK_MAX_BUFS],
        };
        for (index, slot) in header.slots.iter_mut().take(self.num_buffers).enumerate() {
            slot.buffer_offset = (first_buffer + index * stride) as i32;
        }

        let region = MemoryRegion::new(total);
        region.write(0, &header.encode())?;
        for (index, variable) in self.variables.iter().enumerate() {
            region.write(var_header_offset + index * VAR_HEADER_SIZE, &variable.encode())?;
        }
        region.write(session_info_offset, self.session_text.as_bytes())?;

        debug!(
            bytes = total,
            num_vars = self.variables.len(),
            num_buffers = self.num_buffers,
            buffer_len,
            "Built simulated region"
        );

        let event = MemoryEvent::new();
        Ok(Producer {
            source: SimulatedSource::new(region.clone(), event.clone()),
            region,
            event,
            header,
            variables: self.variables.into(),
            next_slot: 0,
            tick: 0,
        })
    }
}

/// Writes rows and session updates into a simulated region.
#[derive(Debug)]
pub struct Producer {
    region: MemoryRegion,
    event: MemoryEvent,
    source: SimulatedSource,
    header: TelemetryHeader,
    variables: Arc<[VariableDescriptor]>,
    next_slot: usize,
    tick: i32,
}

impl Producer {
    /// Handle to the region for a reader.
    pub fn region(&self) -> MemoryRegion {
        self.region.clone()
    }

    /// Handle to the data-valid event for a reader.
    pub fn event(&self) -> MemoryEvent {
        self.event.clone()
    }

    /// A [`RegionSource`] that opens this producer's objects.
    pub fn source(&self) -> SimulatedSource {
        self.source.clone()
    }

    /// Header as last written, slot ticks excluded.
    pub fn header(&self) -> &TelemetryHeader {
        &self.header
    }

    pub fn variables(&self) -> &[VariableDescriptor] {
        &self.variables
    }

    /// Tick of the last published row.
    pub fn tick(&self) -> i32 {
        self.tick
    }

    /// Zeroed row for this layout.
    pub fn row(&self) -> RowBuilder {
        RowBuilder {
            row: vec![0; self.header.buffer_len as usize],
            variables: Arc::clone(&self.variables),
        }
    }

    /// Publish `row` under the next tick. Returns that tick.
    pub fn publish(&mut self, row: &[u8]) -> Result<i32> {
        let tick = self.tick.wrapping_add(1);
        self.publish_at(tick, row)?;
        Ok(tick)
    }

    /// Publish `row` under an explicit tick into the next slot.
    pub fn publish_at(&mut self, tick: i32, row: &[u8]) -> Result<()> {
        if row.len() != self.header.buffer_len as usize {
            return Err(TelemetryError::buffer_operation_error(
                format!("Row is {} bytes, layout needs {}", row.len(), self.header.buffer_len),
                Some(self.next_slot),
            ));
        }

        let slot = self.next_slot;
        let offset = self.header.slots[slot].buffer_offset as usize;
        self.region.write(offset, row)?;
        self.region.write_i32(BufferSlot::tick_count_offset(slot), tick)?;
        self.set_connected(true)?;

        self.tick = tick;
        self.next_slot = (slot + 1) % self.header.num_buffers as usize;
        self.event.signal();
        Ok(())
    }

    /// Set or clear the connected status flag.
    pub fn set_connected(&mut self, connected: bool) -> Result<()> {
        let status = if connected { IRSDK_STATUS_CONNECTED } else { 0 };
        if status != self.header.status {
            debug!(connected, "Simulated producer status changed");
        }
        self.header.status = status;
        self.region.write_i32(STATUS_OFFSET, status)
    }

    /// Clear the status flag and wake any waiting reader.
    pub fn disconnect(&mut self) -> Result<()> {
        self.set_connected(false)?;
        self.event.signal();
        Ok(())
    }

    /// Replace the session document and bump the update counter.
    pub fn set_session_text(&mut self, text: &str) -> Result<()> {
        let capacity = self.header.session_info_len as usize;
        if text.len() >= capacity {
            return Err(TelemetryError::buffer_operation_error(
                format!("Session text is {} bytes, capacity is {}", text.len(), capacity),
                None,
            ));
        }

        let mut bytes = vec![0u8; capacity];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        self.region.write(self.header.session_info_offset as usize, &bytes)?;

        self.header.session_info_update = self.header.session_info_update.wrapping_add(1);
        self.region.write_i32(SESSION_INFO_UPDATE_OFFSET, self.header.session_info_update)
    }

    /// Start over from tick zero, as the simulator does when it restarts.
    pub fn restart(&mut self) -> Result<()> {
        for slot in 0..self.header.num_buffers as usize {
            self.region.write_i32(BufferSlot::tick_count_offset(slot), 0)?;
        }
        debug!(previous_tick = self.tick, "Simulated producer restarted");
        self.tick = 0;
        self.next_slot = 0;
        Ok(())
    }
}

/// Element types a [`RowBuilder`] can write.
pub trait RowValue: Copy {
    const TYPE: VariableType;

    fn write_le(self, dst: &mut [u8]);
}

impl RowValue for f32 {
    const TYPE: VariableType = VariableType::Float;

    fn write_le(self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.to_le_bytes());
    }
}

impl RowValue for f64 {
    const TYPE: VariableType = VariableType::Double;

    fn write_le(self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.to_le_bytes());
    }
}

impl RowValue for i32 {
    const TYPE: VariableType = VariableType::Int;

    fn write_le(self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.to_le_bytes());
    }
}

impl RowValue for bool {
    const TYPE: VariableType = VariableType::Bool;

    fn write_le(self, dst: &mut [u8]) {
        dst[0] = u8::from(self);
    }
}

impl RowValue for u8 {
    const TYPE: VariableType = VariableType::Char;

    fn write_le(self, dst: &mut [u8]) {
        dst[0] = self;
    }
}

impl RowValue for BitField {
    const TYPE: VariableType = VariableType::BitField;

    fn write_le(self, dst: &mut [u8]) {
        dst.copy_from_slice(&self.0.to_le_bytes());
    }
}

/// Fills a row by variable name.
#[derive(Debug, Clone)]
pub struct RowBuilder {
    row: Vec<u8>,
    variables: Arc<[VariableDescriptor]>,
}

impl RowBuilder {
    /// Set the first element of `name`.
    pub fn set<T: RowValue>(self, name: &str, value: T) -> Result<Self> {
        self.set_index(name, 0, value)
    }

    /// Set element `index` of the array variable `name`.
    pub fn set_index<T: RowValue>(mut self, name: &str, index: usize, value: T) -> Result<Self> {
        let descriptor = self
            .variables
            .iter()
            .find(|variable| variable.name == name)
            .ok_or_else(|| TelemetryError::VariableNotFound { name: name.to_string() })?;

        if descriptor.data_type != Some(T::TYPE) {
            return Err(TelemetryError::TypeConversion {
                details: format!("'{}' is {:?}, not {:?}", name, descriptor.data_type, T::TYPE),
            });
        }

        if index >= descriptor.count {
            return Err(TelemetryError::memory_access_error(descriptor.offset));
        }
        let size = T::TYPE.size();
        let offset = descriptor.offset + index * size;
        let dst = self
            .row
            .get_mut(offset..offset + size)
            .ok_or(TelemetryError::Memory { offset })?;
        value.write_le(dst);
        Ok(self)
    }

    pub fn build(self) -> Vec<u8> {
        self.row
    }
}

/// Opens a producer's region and event; can be switched off to mimic the
/// simulator not running.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    region: MemoryRegion,
    event: MemoryEvent,
    available: Arc<AtomicBool>,
    opens: Arc<AtomicUsize>,
}

impl SimulatedSource {
    fn new(region: MemoryRegion, event: MemoryEvent) -> Self {
        Self {
            region,
            event,
            available: Arc::new(AtomicBool::new(true)),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// While false, opening fails with `ResourceNotFound`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl RegionSource for SimulatedSource {
    type Region = MemoryRegion;
    type Event = MemoryEvent;

    fn open(&self, config: &ReaderConfig) -> Result<(MemoryRegion, MemoryEvent)> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(TelemetryError::resource_not_found(config.memmap_name.clone()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok((self.region.clone(), self.event.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::SharedRegion;
    use crate::variables::VariableTable;

    fn layout() -> RegionLayout {
        RegionLayout::new(3)
            .variable("Speed", VariableType::Float, 1, "m/s", "GPS vehicle speed")
            .variable("CarIdxLap", VariableType::Int, 4, "", "Laps started by car index")
            .variable("OnPitRoad", VariableType::Bool, 1, "", "Is the player car on pit road")
            .session_text("WeekendInfo:\n TrackName: spa up\n")
    }

    #[test]
    fn image_decodes_as_a_valid_region() {
        let producer = layout().build().unwrap();
        let region = producer.region();
        let header = TelemetryHeader::read_from(&region).unwrap();

        assert_eq!(header.version, IRSDK_VER);
        assert!(!header.is_connected());
        assert_eq!(header.buffer_len, 4 + 16 + 1);
        header.validate_buffers().unwrap();

        let table = VariableTable::new(&region, &header).unwrap();
        assert_eq!(table.offset_of("CarIdxLap").unwrap(), Some(4));
        assert_eq!(table.offset_of("OnPitRoad").unwrap(), Some(20));

        for slot in header.active_slots() {
            let end = slot.buffer_offset as usize + header.buffer_len as usize;
            assert!(end <= region.len());
            assert_eq!(slot.buffer_offset as usize % ALIGN, 0);
        }
    }

    #[test]
    fn publish_rotates_slots() {
        let mut producer = layout().build().unwrap();
        let row = producer.row().build();
        for expected in 1..=4 {
            assert_eq!(producer.publish(&row).unwrap(), expected);
        }

        let header = TelemetryHeader::read_from(&producer.region()).unwrap();
        assert!(header.is_connected());
        let ticks: Vec<i32> = header.active_slots().iter().map(|s| s.tick_count).collect();
        assert_eq!(ticks, vec![4, 2, 3]);
        assert_eq!(header.freshest_slot(), 0);
    }

    #[test]
    fn row_builder_checks_names_and_types() {
        let producer = layout().build().unwrap();
        let row = producer
            .row()
            .set("Speed", 12.5f32)
            .unwrap()
            .set_index("CarIdxLap", 3, 7)
            .unwrap()
            .set("OnPitRoad", true)
            .unwrap()
            .build();
        assert_eq!(&row[0..4], &12.5f32.to_le_bytes());
        assert_eq!(&row[16..20], &7i32.to_le_bytes());
        assert_eq!(row[20], 1);

        assert!(matches!(
            producer.row().set("Speed", 1i32),
            Err(TelemetryError::TypeConversion { .. })
        ));
        assert!(matches!(
            producer.row().set("Nope", 1.0f32),
            Err(TelemetryError::VariableNotFound { .. })
        ));
        assert!(producer.row().set_index("CarIdxLap", 4, 1).is_err());
    }

    #[test]
    fn wrong_row_length_is_rejected() {
        let mut producer = layout().build().unwrap();
        assert!(matches!(producer.publish(&[0u8; 3]), Err(TelemetryError::Buffer { .. })));
    }

    #[test]
    fn session_text_updates_bump_counter() {
        let mut producer = layout().session_capacity(64).build().unwrap();
        producer.set_session_text("A: 1\n").unwrap();
        producer.set_session_text("A: 2\n").unwrap();
        assert_eq!(producer.header().session_info_update, 2);

        let too_long = "x".repeat(64);
        assert!(producer.set_session_text(&too_long).is_err());
    }

    #[test]
    fn restart_clears_slot_ticks() {
        let mut producer = layout().build().unwrap();
        let row = producer.row().build();
        producer.publish(&row).unwrap();
        producer.publish(&row).unwrap();
        producer.restart().unwrap();

        let header = TelemetryHeader::read_from(&producer.region()).unwrap();
        assert!(header.active_slots().iter().all(|slot| slot.tick_count == 0));
        assert_eq!(producer.publish(&row).unwrap(), 1);
    }

    #[test]
    fn invalid_buffer_count_is_rejected() {
        assert!(RegionLayout::new(0).build().is_err());
        assert!(RegionLayout::new(5).build().is_err());
    }
}
