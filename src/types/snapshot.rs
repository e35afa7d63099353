//! Owned telemetry rows

use std::sync::Arc;

use super::VarData;
use crate::Result;
use crate::variables::VariableDescriptor;

/// One row copied out of the region together with its tick.
///
/// Cloning shares the row bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Row bytes, `buffer_len` long
    pub data: Arc<[u8]>,

    /// Tick count the producer stamped on the row
    pub tick: i32,

    /// Session info update counter at the time of the copy
    pub session_update: i32,
}

impl Snapshot {
    pub fn new(data: Vec<u8>, tick: i32, session_update: i32) -> Self {
        Self { data: data.into(), tick, session_update }
    }

    /// Typed read of a variable from this row.
    pub fn get<T: VarData>(&self, descriptor: &VariableDescriptor) -> Result<T> {
        T::from_row(&self.data, descriptor)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariableType;

    #[test]
    fn typed_access_through_descriptor() {
        let mut row = vec![0u8; 8];
        row[4..8].copy_from_slice(&4500.0f32.to_le_bytes());
        let snapshot = Snapshot::new(row, 12345, 1);

        let rpm = VariableDescriptor {
            name: "RPM".to_string(),
            description: "Engine rpm".to_string(),
            unit: "revs/min".to_string(),
            type_tag: VariableType::Float.raw(),
            data_type: Some(VariableType::Float),
            offset: 4,
            count: 1,
            count_as_time: false,
        };
        assert_eq!(snapshot.get::<f32>(&rpm).unwrap(), 4500.0);

        let shared = snapshot.clone();
        assert!(Arc::ptr_eq(&shared.data, &snapshot.data));
        assert_eq!(shared.len(), 8);
    }
}
