//! Variable data parsing trait and implementations

use super::{BitField, VariableType};
use crate::variables::VariableDescriptor;
use crate::{Result, TelemetryError};

/// Types that can be read out of a row through a descriptor.
pub trait VarData: Sized {
    /// Parse one value of this type at `offset` within `row`.
    ///
    /// The descriptor's element type is checked first; `offset` lets array
    /// accessors reuse the same descriptor for every element.
    fn read_at(row: &[u8], descriptor: &VariableDescriptor, offset: usize) -> Result<Self>;

    /// Parse the descriptor's first element.
    fn from_row(row: &[u8], descriptor: &VariableDescriptor) -> Result<Self> {
        Self::read_at(row, descriptor, descriptor.offset)
    }
}

fn expect_type(descriptor: &VariableDescriptor, accepted: &[VariableType]) -> Result<()> {
    match descriptor.data_type {
        Some(ty) if accepted.contains(&ty) => Ok(()),
        other => Err(TelemetryError::TypeConversion {
            details: format!(
                "'{}' is {:?} (tag {}), expected one of {:?}",
                descriptor.name, other, descriptor.type_tag, accepted
            ),
        }),
    }
}

fn bytes_at<const N: usize>(row: &[u8], offset: usize) -> Result<[u8; N]> {
    offset
        .checked_add(N)
        .and_then(|end| row.get(offset..end))
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(TelemetryError::Memory { offset })
}

impl VarData for f32 {
    fn read_at(row: &[u8], descriptor: &VariableDescriptor, offset: usize) -> Result<Self> {
        expect_type(descriptor, &[VariableType::Float])?;
        Ok(f32::from_le_bytes(bytes_at(row, offset)?))
    }
}

impl VarData for f64 {
    fn read_at(row: &[u8], descriptor: &VariableDescriptor, offset: usize) -> Result<Self> {
        expect_type(descriptor, &[VariableType::Double, VariableType::Float])?;
        // Floats widen losslessly.
        if descriptor.data_type == Some(VariableType::Float) {
            return Ok(f64::from(f32::from_le_bytes(bytes_at(row, offset)?)));
        }
        Ok(f64::from_le_bytes(bytes_at(row, offset)?))
    }
}

impl VarData for i32 {
    fn read_at(row: &[u8], descriptor: &VariableDescriptor, offset: usize) -> Result<Self> {
        expect_type(descriptor, &[VariableType::Int, VariableType::BitField])?;
        Ok(i32::from_le_bytes(bytes_at(row, offset)?))
    }
}

impl VarData for bool {
    fn read_at(row: &[u8], descriptor: &VariableDescriptor, offset: usize) -> Result<Self> {
        expect_type(descriptor, &[VariableType::Bool])?;
        let [byte] = bytes_at::<1>(row, offset)?;
        Ok(byte != 0)
    }
}

impl VarData for u8 {
    fn read_at(row: &[u8], descriptor: &VariableDescriptor, offset: usize) -> Result<Self> {
        expect_type(descriptor, &[VariableType::Char, VariableType::Bool])?;
        let [byte] = bytes_at::<1>(row, offset)?;
        Ok(byte)
    }
}

impl VarData for BitField {
    fn read_at(row: &[u8], descriptor: &VariableDescriptor, offset: usize) -> Result<Self> {
        expect_type(descriptor, &[VariableType::BitField])?;
        Ok(BitField(u32::from_le_bytes(bytes_at(row, offset)?)))
    }
}

// Array support for VarData
impl<T: VarData> VarData for Vec<T> {
    fn read_at(row: &[u8], descriptor: &VariableDescriptor, offset: usize) -> Result<Self> {
        let element_size = descriptor
            .data_type
            .map(|ty| ty.size())
            .ok_or_else(|| TelemetryError::TypeConversion {
                details: format!(
                    "'{}' has unknown type tag {}",
                    descriptor.name, descriptor.type_tag
                ),
            })?;

        (0..descriptor.count)
            .map(|index| T::read_at(row, descriptor, offset + index * element_size))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn descriptor(ty: VariableType, offset: usize, count: usize) -> VariableDescriptor {
        VariableDescriptor {
            name: "Test".to_string(),
            description: String::new(),
            unit: String::new(),
            type_tag: ty.raw(),
            data_type: Some(ty),
            offset,
            count,
            count_as_time: false,
        }
    }

    proptest! {
        #[test]
        fn f32_reads_at_any_offset(value in any::<f32>(), offset in 0..100usize) {
            let mut row = vec![0u8; offset + 4 + 10];
            row[offset..offset + 4].copy_from_slice(&value.to_le_bytes());

            let parsed = f32::from_row(&row, &descriptor(VariableType::Float, offset, 1)).unwrap();
            prop_assert_eq!(parsed.to_bits(), value.to_bits());
        }

        #[test]
        fn bitfield_handles_all_32bit_patterns(value in any::<u32>(), offset in 0..100usize) {
            let mut row = vec![0u8; offset + 4];
            row[offset..offset + 4].copy_from_slice(&value.to_le_bytes());

            let flags = descriptor(VariableType::BitField, offset, 1);
            let parsed = BitField::from_row(&row, &flags).unwrap();
            prop_assert_eq!(parsed.value(), value);
        }
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let row = [0u8; 8];
        let result = f32::from_row(&row, &descriptor(VariableType::Int, 0, 1));
        assert!(matches!(result, Err(TelemetryError::TypeConversion { .. })));
        assert!(bool::from_row(&row, &descriptor(VariableType::Float, 0, 1)).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut desc = descriptor(VariableType::Int, 0, 2);
        desc.data_type = None;
        desc.type_tag = 42;
        assert!(matches!(
            Vec::<i32>::from_row(&[0u8; 8], &desc),
            Err(TelemetryError::TypeConversion { .. })
        ));
    }

    #[test]
    fn out_of_row_read_is_a_memory_error() {
        let row = [0u8; 6];
        let result = i32::from_row(&row, &descriptor(VariableType::Int, 4, 1));
        assert!(matches!(result, Err(TelemetryError::Memory { offset: 4 })));
        let overflow = i32::read_at(&row, &descriptor(VariableType::Int, 0, 1), usize::MAX);
        assert!(overflow.is_err());
    }

    #[test]
    fn float_widens_to_f64() {
        let row = 1.5f32.to_le_bytes();
        assert_eq!(f64::from_row(&row, &descriptor(VariableType::Float, 0, 1)).unwrap(), 1.5);
    }

    #[test]
    fn per_car_arrays_read_every_element() {
        let mut row = vec![0u8; 16];
        for (index, value) in [3i32, -1, 7, 64].iter().enumerate() {
            row[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        let values = Vec::<i32>::from_row(&row, &descriptor(VariableType::Int, 0, 4)).unwrap();
        assert_eq!(values, vec![3, -1, 7, 64]);

        let short = Vec::<i32>::from_row(&row[..12], &descriptor(VariableType::Int, 0, 4));
        assert!(short.is_err());
    }

    #[test]
    fn bool_array_from_bytes() {
        let row = [1u8, 0, 2];
        let values = Vec::<bool>::from_row(&row, &descriptor(VariableType::Bool, 0, 3)).unwrap();
        assert_eq!(values, vec![true, false, true]);
    }
}
