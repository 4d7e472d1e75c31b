//! Error types for the commit log
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using LogError
pub type Result<T> = std::result::Result<T, LogError>;

/// Unified error type for commit log operations
#[derive(Debug, Error)]
pub enum LogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File already closed: {}", .0.display())]
    Closed(PathBuf),

    // -------------------------------------------------------------------------
    // Addressing Errors
    // -------------------------------------------------------------------------
    /// No retained segment holds the requested absolute offset.
    #[error("Offset out of range: {offset}")]
    OffsetOutOfRange { offset: u64 },

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Index is empty")]
    IndexEmpty,

    #[error("Index entry out of range: relative offset {relative_offset}")]
    IndexOutOfRange { relative_offset: u64 },

    /// Surfacing this means the rotation policy let a segment overrun its index.
    #[error("Index full: capacity {capacity} bytes")]
    IndexFull { capacity: u64 },

    // -------------------------------------------------------------------------
    // Log Errors
    // -------------------------------------------------------------------------
    /// The record at `offset` is committed, but opening the next segment failed.
    #[error("Record {offset} committed but segment rotation failed: {source}")]
    Rotation {
        offset: u64,
        #[source]
        source: Box<LogError>,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LogError {
    /// True when the error only says "nothing stored at this offset".
    ///
    /// Streaming consumers treat this as "not produced yet" and poll again.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, LogError::OffsetOutOfRange { .. })
    }
}

impl From<bincode::Error> for LogError {
    fn from(err: bincode::Error) -> Self {
        LogError::Serialization(err.to_string())
    }
}

impl From<LogError> for std::io::Error {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Io(e) => e,
            other => std::io::Error::other(other),
        }
    }
}
