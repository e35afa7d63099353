//! BitField type for handling SDK bitfield variables

use serde::{Deserialize, Serialize};

/// Raw 32-bit flags word such as `SessionFlags` or `EngineWarnings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BitField(pub u32);

impl BitField {
    /// Create a new BitField from a u32 value.
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Check if a specific bit is set.
    pub fn is_set(&self, bit: u32) -> bool {
        bit < 32 && (self.0 & (1 << bit)) != 0
    }

    /// Check if any bit of `flag` is set.
    pub fn has_flag(&self, flag: u32) -> bool {
        (self.0 & flag) != 0
    }

    /// Check that every bit of `flags` is set.
    pub fn has_all(&self, flags: u32) -> bool {
        (self.0 & flags) == flags
    }

    /// Get the raw u32 value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for BitField {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
