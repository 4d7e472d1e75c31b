//! Segment
//!
//! One store plus one index covering the half-open offset range
//! `[base_offset, next_offset)`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::SegmentConfig;
use crate::error::{LogError, Result};
use crate::record::Record;

use super::index::{Index, ENTRY_WIDTH};
use super::scan::{index_file_name, store_file_name};
use super::store::Store;

/// A store/index pair bounded by an offset range
pub struct Segment {
    /// Record frames; shared with any `LogReader` snapshotting this segment
    store: Arc<Store>,

    /// Relative offset → store position
    index: Index,

    /// Lowest absolute offset this segment is responsible for
    base_offset: u64,

    /// Offset the next append receives
    next_offset: u64,

    config: SegmentConfig,
}

impl Segment {
    /// Open or create the segment starting at `base_offset` in `dir`
    ///
    /// `next_offset` is recovered from the last index entry whose frame is
    /// complete in the store. After an unclean shutdown the index can run
    /// ahead of the store (or the store ahead of the index); trailing entries
    /// without a frame are dropped and store bytes past the last indexed
    /// frame are cut off.
    pub fn open(dir: &Path, base_offset: u64, config: SegmentConfig) -> Result<Self> {
        let store = Store::open(&dir.join(store_file_name(base_offset)))?;
        let index = Index::open(&dir.join(index_file_name(base_offset)), config.max_index_bytes)?;

        let mut dropped = 0u64;
        let (next_offset, store_end) = loop {
            let entry = match index.read_last() {
                Ok(entry) => entry,
                Err(LogError::IndexEmpty) => break (base_offset, 0),
                Err(e) => return Err(e),
            };
            if let Some(end) = store.frame_end(entry.position)? {
                break (base_offset + entry.relative_offset as u64 + 1, end);
            }
            index.truncate_entries(index.len() - 1);
            dropped += 1;
        };

        if dropped > 0 {
            tracing::warn!(
                "Segment {}: dropped {} index entries pointing past the end of the store",
                base_offset,
                dropped
            );
        }
        if store.size() > store_end {
            tracing::warn!(
                "Segment {}: discarding {} unindexed bytes at the end of the store",
                base_offset,
                store.size() - store_end
            );
            store.truncate(store_end)?;
        }

        tracing::debug!(
            "Opened segment {} (next offset {}, store {} bytes, index {} bytes)",
            base_offset,
            next_offset,
            store.size(),
            index.size()
        );

        Ok(Self {
            store: Arc::new(store),
            index,
            base_offset,
            next_offset,
            config,
        })
    }

    /// Append a record, stamping it with the next offset
    ///
    /// `next_offset` only advances once both the store and index writes
    /// succeed; a failed index write leaves an unaddressed tail in the store.
    pub fn append(&mut self, mut record: Record) -> Result<u64> {
        let offset = self.next_offset;
        let relative = u32::try_from(offset - self.base_offset).map_err(|_| LogError::IndexFull {
            capacity: self.index.capacity(),
        })?;

        record.offset = offset;
        let payload = record.encode()?;

        let (_, position) = self.store.append(&payload)?;
        self.index.write(relative, position)?;

        self.next_offset += 1;
        Ok(offset)
    }

    /// Read the record at absolute `offset`
    pub fn read(&self, offset: u64) -> Result<Record> {
        let relative = offset
            .checked_sub(self.base_offset)
            .and_then(|r| u32::try_from(r).ok())
            .ok_or(LogError::OffsetOutOfRange { offset })?;

        let entry = self.index.read(relative).map_err(|e| match e {
            LogError::IndexEmpty | LogError::IndexOutOfRange { .. } => {
                LogError::OffsetOutOfRange { offset }
            }
            other => other,
        })?;

        let payload = self.store.read(entry.position)?;
        Record::decode(&payload)
    }

    /// True once either byte budget is reached
    ///
    /// The index counts as maxed as soon as it cannot take one more entry.
    pub fn is_maxed(&self) -> bool {
        self.store.size() >= self.config.max_store_bytes
            || self.index.size() + ENTRY_WIDTH > self.config.max_index_bytes
    }

    /// Whether `offset` falls in `[base_offset, next_offset)`
    pub fn contains(&self, offset: u64) -> bool {
        self.base_offset <= offset && offset < self.next_offset
    }

    /// True when no record has been appended
    pub fn is_empty(&self) -> bool {
        self.next_offset == self.base_offset
    }

    /// Flush buffered store frames to disk
    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    /// Close the index, then the store
    pub fn close(&self) -> Result<()> {
        self.index.close()?;
        self.store.close()
    }

    /// Close and delete both backing files
    pub fn remove(self) -> Result<()> {
        self.close()?;
        // Store first: a leftover index over a missing store recovers as empty
        fs::remove_file(self.store.path())?;
        fs::remove_file(self.index.path())?;
        Ok(())
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Shared handle to the store, for sequential export
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn index(&self) -> &Index {
        &self.index
    }
}
