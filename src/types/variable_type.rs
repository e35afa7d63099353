//! Telemetry variable type definitions

use serde::{Deserialize, Serialize};

/// Element type of a telemetry variable.
/// Maps to the SDK's irsdk_VarType enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableType {
    /// 8-bit character (irsdk_char = 0)
    Char = 0,
    /// Boolean stored as one byte (irsdk_bool = 1)
    Bool = 1,
    /// 32-bit signed integer (irsdk_int = 2)
    Int = 2,
    /// 32-bit bitfield (irsdk_bitField = 3)
    BitField = 3,
    /// 32-bit float (irsdk_float = 4)
    Float = 4,
    /// 64-bit float (irsdk_double = 5)
    Double = 5,
}

impl VariableType {
    /// Decode the raw type tag; unknown tags yield `None`.
    pub const fn from_raw(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(VariableType::Char),
            1 => Some(VariableType::Bool),
            2 => Some(VariableType::Int),
            3 => Some(VariableType::BitField),
            4 => Some(VariableType::Float),
            5 => Some(VariableType::Double),
            _ => None,
        }
    }

    /// Raw SDK type tag.
    pub const fn raw(self) -> i32 {
        self as i32
    }

    /// Returns the size in bytes of one element.
    /// Matches the irsdk_VarTypeBytes array from the SDK.
    pub const fn size(&self) -> usize {
        match self {
            VariableType::Char | VariableType::Bool => 1,
            VariableType::Int | VariableType::BitField | VariableType::Float => 4,
            VariableType::Double => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_tags_round_trip_sizes() {
        let expected = [(0, 1), (1, 1), (2, 4), (3, 4), (4, 4), (5, 8)];
        for (tag, size) in expected {
            let ty = VariableType::from_raw(tag).expect("known tag");
            assert_eq!(ty.size(), size, "tag {tag}");
            assert_eq!(ty.raw(), tag);
        }
        assert_eq!(VariableType::from_raw(6), None);
        assert_eq!(VariableType::from_raw(-1), None);
    }
}
