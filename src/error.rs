//! Error types for telemetry polling.
//!
//! Only failures the caller must act on surface as errors. Conditions the
//! reader absorbs on its own (read tears, tick regressions) are logged and
//! reported as "no new data", and missing session metadata is an `Option`.
//!
//! ## Error Categories
//!
//! - **Attach Errors**: the simulator's shared memory or event does not exist
//! - **Layout Errors**: the header or descriptor table is out of bounds or malformed
//! - **Buffer Errors**: caller-supplied destinations that cannot hold a row
//! - **Configuration Errors**: invalid or unreadable [`ReaderConfig`](crate::ReaderConfig)
//! - **Windows API Errors**: platform-specific failures while mapping or waiting
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use irsdk_poll::TelemetryError;
//!
//! let error = TelemetryError::resource_not_found("Local\\IRSDKMemMapFileName");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use thiserror::Error;

use crate::config::ConfigError;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Simulator resource not found: {resource}")]
    ResourceNotFound {
        resource: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("SDK version mismatch: expected {expected}, found {found}")]
    Version { expected: i32, found: i32 },

    #[error("Memory access violation at offset {offset:#x}")]
    Memory { offset: usize },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Variable '{name}' not found in telemetry schema")]
    VariableNotFound { name: String },

    #[error("Type conversion error: {details}")]
    TypeConversion { details: String },

    #[error("Buffer operation failed: {context}")]
    Buffer { context: String, buffer_index: Option<usize> },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::ResourceNotFound { .. } => true,
            TelemetryError::Memory { .. } => true,
            TelemetryError::Buffer { .. } => false,
            TelemetryError::Version { .. } => false,
            TelemetryError::Parse { .. } => true,
            TelemetryError::VariableNotFound { .. } => false,
            TelemetryError::TypeConversion { .. } => false,
            TelemetryError::Config(_) => false,
            TelemetryError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::ResourceNotFound { .. } => vec![
                "Ensure iRacing is running",
                "Retry attaching on a timer until the simulator starts",
                "Check the configured shared memory and event names",
            ],
            TelemetryError::Version { .. } => vec![
                "Update iRacing to latest version",
                "Update library to compatible version",
            ],
            TelemetryError::Memory { .. } => vec![
                "Drop the connection and attach again",
                "Verify the simulator did not restart mid-read",
            ],
            TelemetryError::Parse { .. } => vec![
                "Drop the connection and attach again",
                "Verify source data integrity",
            ],
            TelemetryError::VariableNotFound { .. } => vec![
                "Check variable name spelling",
                "Verify the variable exists for the current car",
            ],
            TelemetryError::TypeConversion { .. } => vec![
                "Check the variable's declared type",
                "Use the accessor matching the descriptor type",
            ],
            TelemetryError::Buffer { .. } => vec![
                "Size destination buffers from the header's buffer length",
                "Use Connection::row_len() to allocate",
            ],
            TelemetryError::Config(_) => vec![
                "Check the configuration file syntax",
                "Verify field values are within their allowed ranges",
            ],
            TelemetryError::UnsupportedPlatform { .. } => vec![
                "Use the in-memory region for development off Windows",
                "Check documentation for platform requirements",
            ],
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => vec![
                "Check Windows API permissions",
                "Drop the connection and attach again",
            ],
        }
    }

    /// Helper constructor for missing simulator resources.
    pub fn resource_not_found(resource: impl Into<String>) -> Self {
        TelemetryError::ResourceNotFound { resource: resource.into(), source: None }
    }

    /// Helper constructor for missing simulator resources with source.
    pub fn resource_not_found_with_source(
        resource: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::ResourceNotFound { resource: resource.into(), source: Some(source) }
    }

    /// Helper constructor for memory access errors.
    pub fn memory_access_error(offset: usize) -> Self {
        TelemetryError::Memory { offset }
    }

    /// Helper constructor for header/layout parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for buffer operation errors.
    pub fn buffer_operation_error(context: impl Into<String>, buffer_index: Option<usize>) -> Self {
        TelemetryError::Buffer { context: context.into(), buffer_index }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        TelemetryError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        TelemetryError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

#[cfg(windows)]
impl From<core::Error> for TelemetryError {
    fn from(err: core::Error) -> Self {
        TelemetryError::WindowsApi {
            operation: "Unknown Windows operation".to_string(),
            source: err,
        }
    }
}
