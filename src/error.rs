// Sensor Align - Time-ordered alignment of wearable sensor logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for sensor-align
//!
//! End of a stream is never an error: merge iterators report it as
//! `Ok(None)` from `pop`/`peek` and as the end of iteration.

use thiserror::Error;

/// Result type alias for sensor-align operations
pub type Result<T> = std::result::Result<T, SensorAlignError>;

/// Main error type for sensor-align operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorAlignError {
    /// A record came out older than one already emitted. Fatal: re-run
    /// with a larger window size.
    #[error(
        "Window too small for stream '{stream}': epoch {epoch} emitted after {last_epoch} \
         (window size {window_size})"
    )]
    WindowTooSmall {
        stream: String,
        epoch: f64,
        last_epoch: f64,
        window_size: usize,
    },

    /// Record type the reader does not know how to handle
    #[error("Unsupported record type: {0}")]
    UnsupportedRecordType(String),

    /// Record that could not be parsed
    #[error("Malformed record in '{file}' at line {line}: {reason}")]
    MalformedRecord {
        file: String,
        line: u64,
        reason: String,
    },

    /// Failure reported by a record source (I/O, missing file, ...)
    #[error("Source error for '{file}': {reason}")]
    Source { file: String, reason: String },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SensorAlignError {
    /// Build a source error from anything printable
    pub fn source_error(file: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Source {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    /// True for ordering violations, the one error a caller can fix by
    /// re-running with a larger window
    pub fn is_window_too_small(&self) -> bool {
        matches!(self, Self::WindowTooSmall { .. })
    }
}
