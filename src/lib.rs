//! Polling reader for the iRacing SDK shared-memory telemetry feed.
//!
//! The simulator publishes telemetry through a named memory mapping: a header,
//! a table of variable descriptors, a YAML-like session document and up to
//! four row buffers it writes round-robin, each stamped with a tick count.
//! This crate attaches to that mapping and its data-valid event, copies out
//! the freshest row without tearing, and answers path queries against the
//! session document.
//!
//! # Features
//!
//! - **Tear-safe polling**: rows are copied out and checked against the slot's
//!   tick; producer restarts are detected and absorbed
//! - **Typed access**: bounds-checked header and descriptor decoding, typed
//!   row reads through [`VarData`]
//! - **Session queries**: single-pass lookup with `Key:{value}` predicates and
//!   a [`SessionPath`] builder
//! - **Portable core**: everything above runs over the [`SharedRegion`] trait;
//!   the live mapping is Windows-only, [`simulator`] works everywhere
//! - **Async streams**: [`stream::SnapshotStream`] behind the `stream` feature
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use irsdk_poll::{TelemetryClient, TelemetryError};
//!
//! fn main() -> irsdk_poll::Result<()> {
//!     let mut client = TelemetryClient::live();
//!     let mut row = Vec::new();
//!
//!     loop {
//!         let connection = match client.ensure_attached() {
//!             Ok(connection) => connection,
//!             Err(e @ TelemetryError::ResourceNotFound { .. }) => {
//!                 eprintln!("{e}");
//!                 std::thread::sleep(Duration::from_secs(1));
//!                 continue;
//!             }
//!             Err(e) => return Err(e),
//!         };
//!
//!         row.resize(connection.row_len()?, 0);
//!         if connection.wait_for_data(Duration::from_millis(16), Some(&mut row))? {
//!             let offset = connection.variable_offset("Speed")?;
//!             println!("tick {:?}, Speed at {:?}", connection.last_tick_count(), offset);
//!         }
//!     }
//! }
//! ```

mod config;
pub mod connection;
mod error;
pub mod header;
pub mod reader;
pub mod region;
pub mod session;
pub mod simulator;
#[cfg(feature = "stream")]
pub mod stream;
pub mod types;
pub mod variables;

pub use config::{
    ConfigError, IRSDK_DATAVALIDEVENTNAME, IRSDK_MEMMAPFILENAME, IRSDK_TIMEOUT_MS, IRSDK_VER,
    ReaderConfig,
};
pub use connection::{Connection, LiveConnection, TelemetryClient};
pub use error::{Result, TelemetryError};
pub use header::{BufferSlot, TelemetryHeader};
pub use reader::{PollOutcome, SnapshotReader};
pub use region::{
    DataEvent, LiveSource, MemoryEvent, MemoryRegion, RegionSource, SharedRegion, WaitResult,
};
pub use session::{SessionMetadata, SessionPath};
pub use types::{BitField, Snapshot, UpdateRate, VarData, VariableType};
pub use variables::VariableDescriptor;

#[cfg(windows)]
pub use region::{MappedRegion, NamedEvent, NamedObjects};
