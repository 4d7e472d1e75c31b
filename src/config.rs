//! Configuration for the commit log
//!
//! Centralized configuration with sensible defaults.

use crate::error::{LogError, Result};
use crate::storage::ENTRY_WIDTH;

/// Default store rotation threshold (bytes)
pub const DEFAULT_MAX_STORE_BYTES: u64 = 1024;

/// Default index capacity and rotation threshold (bytes)
pub const DEFAULT_MAX_INDEX_BYTES: u64 = 1024;

/// Main configuration for a commit log instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    /// Per-segment sizing and the starting offset of a fresh log
    pub segment: SegmentConfig,
}

/// Segment configuration
///
/// Both byte limits are soft: a segment rotates after the append that
/// reaches either of them, so it can overshoot by one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentConfig {
    // -------------------------------------------------------------------------
    // Rotation Thresholds
    // -------------------------------------------------------------------------
    /// Store size (in bytes) at which the active segment is retired
    pub max_store_bytes: u64,

    /// Index capacity (in bytes); the index file is preallocated to this size
    pub max_index_bytes: u64,

    // -------------------------------------------------------------------------
    // Bootstrap
    // -------------------------------------------------------------------------
    /// Absolute offset of the first record in a brand-new log
    pub initial_offset: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            max_store_bytes: DEFAULT_MAX_STORE_BYTES,
            max_index_bytes: DEFAULT_MAX_INDEX_BYTES,
            initial_offset: 0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Replace zero byte limits with the defaults
    pub fn normalized(mut self) -> Self {
        if self.segment.max_store_bytes == 0 {
            self.segment.max_store_bytes = DEFAULT_MAX_STORE_BYTES;
        }
        if self.segment.max_index_bytes == 0 {
            self.segment.max_index_bytes = DEFAULT_MAX_INDEX_BYTES;
        }
        self
    }

    /// Check that a segment built from this config can hold at least one record
    pub fn validate(&self) -> Result<()> {
        if self.segment.max_index_bytes < ENTRY_WIDTH {
            return Err(LogError::Config(format!(
                "max_index_bytes must be at least {} (one index entry), got {}",
                ENTRY_WIDTH, self.segment.max_index_bytes
            )));
        }
        if self.segment.max_store_bytes == 0 {
            return Err(LogError::Config("max_store_bytes must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store rotation threshold (in bytes)
    pub fn max_store_bytes(mut self, bytes: u64) -> Self {
        self.config.segment.max_store_bytes = bytes;
        self
    }

    /// Set the index capacity / rotation threshold (in bytes)
    pub fn max_index_bytes(mut self, bytes: u64) -> Self {
        self.config.segment.max_index_bytes = bytes;
        self
    }

    /// Set the offset a fresh log starts at
    pub fn initial_offset(mut self, offset: u64) -> Self {
        self.config.segment.initial_offset = offset;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
