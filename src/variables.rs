//! Variable descriptor table.
//!
//! Each descriptor is an `irsdk_varHeader` of 144 bytes:
//!
//! | Offset | Size | Field          |
//! |--------|------|----------------|
//! | 0      | 4    | type tag       |
//! | 4      | 4    | row offset     |
//! | 8      | 4    | element count  |
//! | 12     | 1    | count_as_time  |
//! | 16     | 32   | name           |
//! | 48     | 64   | description    |
//! | 112    | 32   | unit           |
//!
//! Strings are NUL-padded. Descriptors are decoded on demand from the region
//! rather than cached, so a table rewritten by a restarted producer is always
//! seen as it is now.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::header::TelemetryHeader;
use crate::region::SharedRegion;
use crate::types::VariableType;
use crate::{Result, TelemetryError};

/// Maximum length of names and units, including the terminator.
pub const IRSDK_MAX_STRING: usize = 32;
/// Maximum length of descriptions, including the terminator.
pub const IRSDK_MAX_DESC: usize = 64;
/// Size of one encoded descriptor.
pub const VAR_HEADER_SIZE: usize = 144;

const NAME_OFFSET: usize = 16;
const DESC_OFFSET: usize = NAME_OFFSET + IRSDK_MAX_STRING;
const UNIT_OFFSET: usize = DESC_OFFSET + IRSDK_MAX_DESC;

/// Decoded variable descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub name: String,
    pub description: String,
    pub unit: String,
    /// Raw type tag as published
    pub type_tag: i32,
    /// Element type; `None` for tags this crate does not know
    pub data_type: Option<VariableType>,
    /// Byte offset of the first element within a row
    pub offset: usize,
    /// Number of elements; greater than one for per-car arrays
    pub count: usize,
    /// Treat an array as a time series rather than per-index values
    pub count_as_time: bool,
}

fn fixed_str(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

fn write_fixed(dst: &mut [u8], text: &str) {
    // Always leave room for the terminator.
    let len = text.len().min(dst.len() - 1);
    dst[..len].copy_from_slice(&text.as_bytes()[..len]);
}

fn le_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

/// Compare a NUL-padded name field against `name` over at most
/// [`IRSDK_MAX_STRING`] bytes.
fn name_matches(field: &[u8], name: &str) -> bool {
    let wanted = name.as_bytes();
    let wanted = &wanted[..wanted.len().min(IRSDK_MAX_STRING)];
    fixed_str(field) == wanted
}

impl VariableDescriptor {
    /// Decode one descriptor.
    pub fn decode(bytes: &[u8; VAR_HEADER_SIZE]) -> Result<Self> {
        let type_tag = le_i32(bytes, 0);
        let offset = le_i32(bytes, 4);
        let count = le_i32(bytes, 8);
        let name = String::from_utf8_lossy(fixed_str(&bytes[NAME_OFFSET..DESC_OFFSET]));

        if offset < 0 || count < 0 {
            return Err(TelemetryError::parse_error(
                "Variable descriptor",
                format!("'{}' has offset {} and count {}", name, offset, count),
            ));
        }

        let data_type = VariableType::from_raw(type_tag);
        if data_type.is_none() {
            debug!(name = %name, type_tag, "Unknown variable type tag");
        }

        Ok(Self {
            name: name.into_owned(),
            description: String::from_utf8_lossy(fixed_str(&bytes[DESC_OFFSET..UNIT_OFFSET]))
                .into_owned(),
            unit: String::from_utf8_lossy(fixed_str(&bytes[UNIT_OFFSET..VAR_HEADER_SIZE]))
                .into_owned(),
            type_tag,
            data_type,
            offset: offset as usize,
            count: count as usize,
            count_as_time: bytes[12] != 0,
        })
    }

    /// Encode into the on-wire layout. Over-long strings are truncated.
    pub fn encode(&self) -> [u8; VAR_HEADER_SIZE] {
        let mut bytes = [0u8; VAR_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.type_tag.to_le_bytes());
        bytes[4..8].copy_from_slice(&(self.offset as i32).to_le_bytes());
        bytes[8..12].copy_from_slice(&(self.count as i32).to_le_bytes());
        bytes[12] = u8::from(self.count_as_time);
        write_fixed(&mut bytes[NAME_OFFSET..DESC_OFFSET], &self.name);
        write_fixed(&mut bytes[DESC_OFFSET..UNIT_OFFSET], &self.description);
        write_fixed(&mut bytes[UNIT_OFFSET..VAR_HEADER_SIZE], &self.unit);
        bytes
    }

    /// Bytes spanned in a row, or `None` for an unknown type.
    pub fn byte_len(&self) -> Option<usize> {
        self.data_type.map(|ty| ty.size() * self.count)
    }
}

/// Lazily decoded view of the descriptor table.
pub struct VariableTable<'r, R: SharedRegion + ?Sized> {
    region: &'r R,
    base: usize,
    len: usize,
}

impl<'r, R: SharedRegion + ?Sized> VariableTable<'r, R> {
    /// View the table described by `header`.
    pub fn new(region: &'r R, header: &TelemetryHeader) -> Result<Self> {
        header.validate_tables()?;
        Ok(Self {
            region,
            base: header.var_header_offset as usize,
            len: header.num_vars as usize,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn entry_offset(&self, index: usize) -> Result<usize> {
        index
            .checked_mul(VAR_HEADER_SIZE)
            .and_then(|rel| rel.checked_add(self.base))
            .ok_or_else(|| TelemetryError::memory_access_error(self.base))
    }

    /// Descriptor at `index`, or `None` past the end of the table.
    pub fn get(&self, index: usize) -> Result<Option<VariableDescriptor>> {
        if index >= self.len {
            return Ok(None);
        }
        let mut bytes = [0u8; VAR_HEADER_SIZE];
        self.region.copy_to(self.entry_offset(index)?, &mut bytes)?;
        VariableDescriptor::decode(&bytes).map(Some)
    }

    /// Index and row offset of the first descriptor named `name`.
    ///
    /// Only the name fields are copied while scanning.
    pub fn find(&self, name: &str) -> Result<Option<(usize, usize)>> {
        let mut field = [0u8; IRSDK_MAX_STRING];
        for index in 0..self.len {
            let entry = self.entry_offset(index)?;
            self.region.copy_to(entry + NAME_OFFSET, &mut field)?;
            if name_matches(&field, name) {
                let offset = self.region.read_i32(entry + 4)?;
                if offset < 0 {
                    return Err(TelemetryError::parse_error(
                        "Variable descriptor",
                        format!("'{}' has offset {}", name, offset),
                    ));
                }
                return Ok(Some((index, offset as usize)));
            }
        }
        Ok(None)
    }

    /// Row offset of the first descriptor named `name`.
    pub fn offset_of(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.find(name)?.map(|(_, offset)| offset))
    }

    /// Decode every descriptor in table order.
    pub fn to_vec(&self) -> Result<Vec<VariableDescriptor>> {
        (0..self.len).filter_map(|index| self.get(index).transpose()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HEADER_SIZE;
    use crate::region::MemoryRegion;
    use proptest::prelude::*;

    fn descriptor(name: &str, ty: VariableType, offset: usize, count: usize) -> VariableDescriptor {
        VariableDescriptor {
            name: name.to_string(),
            description: format!("{} description", name),
            unit: "m/s".to_string(),
            type_tag: ty.raw(),
            data_type: Some(ty),
            offset,
            count,
            count_as_time: false,
        }
    }

    fn region_with(descriptors: &[VariableDescriptor]) -> (MemoryRegion, TelemetryHeader) {
        let region = MemoryRegion::new(HEADER_SIZE + descriptors.len() * VAR_HEADER_SIZE);
        for (index, desc) in descriptors.iter().enumerate() {
            region.write(HEADER_SIZE + index * VAR_HEADER_SIZE, &desc.encode()).unwrap();
        }
        let header = TelemetryHeader {
            num_vars: descriptors.len() as i32,
            var_header_offset: HEADER_SIZE as i32,
            ..Default::default()
        };
        (region, header)
    }

    proptest! {
        #[test]
        fn descriptor_fields_survive_encoding(
            name in "[A-Za-z][A-Za-z0-9_]{0,30}",
            unit in "[a-z/%]{0,20}",
            offset in 0usize..100_000,
            count in 1usize..64,
            count_as_time in any::<bool>(),
        ) {
            let mut desc = descriptor(&name, VariableType::Float, offset, count);
            desc.unit = unit;
            desc.count_as_time = count_as_time;
            prop_assert_eq!(VariableDescriptor::decode(&desc.encode()).unwrap(), desc);
        }
    }

    #[test]
    fn layout_matches_sdk_struct() {
        let desc = descriptor("Speed", VariableType::Float, 12, 1);
        let bytes = desc.encode();
        assert_eq!(&bytes[0..4], &4i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &12i32.to_le_bytes());
        assert_eq!(&bytes[16..21], b"Speed");
        assert_eq!(bytes[21], 0);
        assert_eq!(&bytes[112..115], b"m/s");
    }

    #[test]
    fn long_names_are_truncated_with_terminator() {
        let name = "X".repeat(40);
        let desc = descriptor(&name, VariableType::Int, 0, 1);
        let decoded = VariableDescriptor::decode(&desc.encode()).unwrap();
        assert_eq!(decoded.name.len(), IRSDK_MAX_STRING - 1);
    }

    #[test]
    fn unknown_type_tag_is_kept_raw() {
        let mut desc = descriptor("Mystery", VariableType::Int, 0, 1);
        desc.type_tag = 9;
        desc.data_type = None;
        let decoded = VariableDescriptor::decode(&desc.encode()).unwrap();
        assert_eq!(decoded.type_tag, 9);
        assert_eq!(decoded.data_type, None);
        assert_eq!(decoded.byte_len(), None);
    }

    #[test]
    fn negative_offset_is_rejected() {
        let mut bytes = descriptor("Bad", VariableType::Int, 0, 1).encode();
        bytes[4..8].copy_from_slice(&(-4i32).to_le_bytes());
        assert!(matches!(VariableDescriptor::decode(&bytes), Err(TelemetryError::Parse { .. })));
    }

    #[test]
    fn first_duplicate_wins() {
        let (region, header) = region_with(&[
            descriptor("RPM", VariableType::Float, 0, 1),
            descriptor("Gear", VariableType::Int, 4, 1),
            descriptor("RPM", VariableType::Float, 8, 1),
        ]);
        let table = VariableTable::new(&region, &header).unwrap();
        assert_eq!(table.find("RPM").unwrap(), Some((0, 0)));
        assert_eq!(table.offset_of("Gear").unwrap(), Some(4));
        assert_eq!(table.offset_of("Throttle").unwrap(), None);
    }

    #[test]
    fn lookup_compares_at_most_max_string_bytes() {
        let stored = "A".repeat(31);
        let (region, header) = region_with(&[descriptor(&stored, VariableType::Int, 20, 1)]);
        let table = VariableTable::new(&region, &header).unwrap();
        assert_eq!(table.offset_of(&stored).unwrap(), Some(20));
        assert_eq!(table.offset_of(&"A".repeat(30)).unwrap(), None);
    }

    #[test]
    fn index_past_end_is_none() {
        let (region, header) = region_with(&[descriptor("Speed", VariableType::Float, 0, 1)]);
        let table = VariableTable::new(&region, &header).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0).unwrap().map(|d| d.name), Some("Speed".to_string()));
        assert_eq!(table.get(1).unwrap(), None);
        assert_eq!(table.to_vec().unwrap().len(), 1);
    }

    #[test]
    fn table_beyond_region_is_a_memory_error() {
        let (region, mut header) = region_with(&[descriptor("Speed", VariableType::Float, 0, 1)]);
        header.num_vars = 3;
        let table = VariableTable::new(&region, &header).unwrap();
        assert!(matches!(table.get(2), Err(TelemetryError::Memory { .. })));
        assert!(matches!(table.offset_of("Nope"), Err(TelemetryError::Memory { .. })));
    }
}
