//! Record definitions
//!
//! The unit of data appended to and read from the log.

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{LogError, Result};

/// Maximum encoded record size (16 MB)
pub const MAX_RECORD_BYTES: u64 = 16 * 1024 * 1024;

/// A single record in the log
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Opaque payload
    pub value: Vec<u8>,

    /// Absolute offset, assigned by the log on append
    pub offset: u64,
}

impl Record {
    /// Create a record carrying `value`; the offset is set on append.
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self {
            value: value.into(),
            offset: 0,
        }
    }

    /// Serialize to the on-disk payload format
    ///
    /// Fails before producing any bytes if the record exceeds `MAX_RECORD_BYTES`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(codec().serialize(self)?)
    }

    /// Deserialize a payload produced by `encode`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() as u64 > MAX_RECORD_BYTES {
            return Err(LogError::Serialization(format!(
                "Record too large: {} bytes (max {})",
                bytes.len(),
                MAX_RECORD_BYTES
            )));
        }
        Ok(codec().deserialize(bytes)?)
    }
}

/// Fixed-width big-endian integers, bounded size, no trailing bytes.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_big_endian()
        .with_limit(MAX_RECORD_BYTES)
        .reject_trailing_bytes()
}
