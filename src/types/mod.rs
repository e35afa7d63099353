//! Value types for telemetry rows.
//!
//! - [`VariableType`] maps the SDK's `irsdk_VarType` enum with element sizes
//! - [`VarData`] reads typed values from a row through a descriptor
//! - [`BitField`] wraps flag words such as `SessionFlags`
//! - [`Snapshot`] is an owned row tagged with its tick
//! - [`irsdk_flags`] holds the SDK's flag constants and enumerations
//!
//! ## Usage Example
//!
//! ```rust
//! use irsdk_poll::types::{Snapshot, VariableType};
//! use irsdk_poll::VariableDescriptor;
//!
//! let rpm = VariableDescriptor {
//!     name: "RPM".to_string(),
//!     description: "Engine rpm".to_string(),
//!     unit: "revs/min".to_string(),
//!     type_tag: VariableType::Float.raw(),
//!     data_type: Some(VariableType::Float),
//!     offset: 0,
//!     count: 1,
//!     count_as_time: false,
//! };
//!
//! let snapshot = Snapshot::new(4500.0f32.to_le_bytes().to_vec(), 12345, 1);
//! let value: f32 = snapshot.get(&rpm).unwrap();
//! assert_eq!(value, 4500.0);
//! ```

mod bitfield;
pub mod irsdk_flags;
mod snapshot;
mod update_rate;
mod var_data;
mod variable_type;

pub use bitfield::BitField;
pub use snapshot::Snapshot;
pub use update_rate::UpdateRate;
pub use var_data::VarData;
pub use variable_type::VariableType;
