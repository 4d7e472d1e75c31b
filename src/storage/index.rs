//! Index
//!
//! Dense, memory-mapped table from segment-relative offset to store position.
//!
//! ## Entry Format
//! ```text
//! ┌──────────────────────┬──────────────────────┐
//! │ Relative Offset (4)  │ Position (8)         │
//! └──────────────────────┴──────────────────────┘
//! ```
//! Entry `n` always holds relative offset `n`, so lookups are a single
//! multiplication. Both fields are big-endian.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};
use parking_lot::RwLock;

use crate::error::{LogError, Result};

use super::mmap::MappedFile;

/// Width of the relative-offset field
pub const OFFSET_WIDTH: u64 = 4;

/// Width of the position field
pub const POSITION_WIDTH: u64 = 8;

/// Width of one index entry
pub const ENTRY_WIDTH: u64 = OFFSET_WIDTH + POSITION_WIDTH;

const ENTRY: usize = ENTRY_WIDTH as usize;

/// A decoded index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Offset relative to the owning segment's base offset
    pub relative_offset: u32,
    /// Byte position of the record's frame in the store
    pub position: u64,
}

impl IndexEntry {
    fn encode(&self) -> [u8; ENTRY] {
        let mut buf = [0u8; ENTRY];
        let mut dst = &mut buf[..];
        dst.put_u32(self.relative_offset);
        dst.put_u64(self.position);
        buf
    }

    fn decode(bytes: [u8; ENTRY]) -> Self {
        let mut src = &bytes[..];
        let relative_offset = src.get_u32();
        let position = src.get_u64();
        Self {
            relative_offset,
            position,
        }
    }
}

/// Memory-mapped offset index
///
/// Carries its own lock so it is safe to use outside a `Log`.
pub struct Index {
    /// Path of the backing file
    path: PathBuf,

    /// Mapped region; `None` once closed
    mapped: RwLock<Option<MappedFile>>,
}

impl Index {
    /// Open or create an index file with `capacity` bytes of room
    ///
    /// Recovers the used size from the file length. A file left at full
    /// capacity by an unclean shutdown is trimmed back to its last dense
    /// entry.
    pub fn open(path: &Path, capacity: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let existing = file.metadata()?.len();
        if existing > capacity {
            return Err(LogError::Config(format!(
                "index {} holds {} bytes, more than max_index_bytes {}",
                path.display(),
                existing,
                capacity
            )));
        }

        let mut mapped = MappedFile::open(file, capacity)?;
        let recovered = Self::recover_used(&mapped);
        if recovered != mapped.used() {
            tracing::warn!(
                "Index {}: ignoring {} trailing bytes past last valid entry",
                path.display(),
                mapped.used() - recovered
            );
            mapped.truncate_used(recovered);
        }

        Ok(Self {
            path: path.to_path_buf(),
            mapped: RwLock::new(Some(mapped)),
        })
    }

    /// Read the entry for `relative_offset`
    pub fn read(&self, relative_offset: u32) -> Result<IndexEntry> {
        self.read_slot(Some(relative_offset as u64))
    }

    /// Read the last written entry
    pub fn read_last(&self) -> Result<IndexEntry> {
        self.read_slot(None)
    }

    /// Append an entry after the last one
    pub fn write(&self, relative_offset: u32, position: u64) -> Result<()> {
        let mut guard = self.mapped.write();
        let mapped = guard
            .as_mut()
            .ok_or_else(|| LogError::Closed(self.path.clone()))?;

        let entry = IndexEntry {
            relative_offset,
            position,
        };
        if !mapped.push(&entry.encode()) {
            return Err(LogError::IndexFull {
                capacity: mapped.capacity(),
            });
        }
        Ok(())
    }

    /// Bytes of the index holding entries
    ///
    /// A closed index reports `0`.
    pub fn size(&self) -> u64 {
        self.mapped.read().as_ref().map_or(0, |m| m.used())
    }

    /// Mapped capacity in bytes
    pub fn capacity(&self) -> u64 {
        self.mapped.read().as_ref().map_or(0, |m| m.capacity())
    }

    /// Number of entries written
    pub fn len(&self) -> u64 {
        self.size() / ENTRY_WIDTH
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync the mapping, fsync, truncate the file to the used size and release it
    ///
    /// Closing an already-closed index is a no-op.
    pub fn close(&self) -> Result<()> {
        match self.mapped.write().take() {
            Some(mapped) => mapped.close(),
            None => Ok(()),
        }
    }

    /// Drop every entry at or after `len` entries
    pub(crate) fn truncate_entries(&self, len: u64) {
        if let Some(mapped) = self.mapped.write().as_mut() {
            mapped.truncate_used(len * ENTRY_WIDTH);
        }
    }

    fn read_slot(&self, slot: Option<u64>) -> Result<IndexEntry> {
        let guard = self.mapped.read();
        let mapped = guard
            .as_ref()
            .ok_or_else(|| LogError::Closed(self.path.clone()))?;

        let count = mapped.entries::<ENTRY>();
        if count == 0 {
            return Err(LogError::IndexEmpty);
        }

        let slot = slot.unwrap_or(count - 1);
        mapped
            .get::<ENTRY>(slot)
            .map(IndexEntry::decode)
            .ok_or(LogError::IndexOutOfRange {
                relative_offset: slot,
            })
    }

    /// Largest used prefix that ends in a dense entry
    fn recover_used(mapped: &MappedFile) -> u64 {
        let mut count = mapped.entries::<ENTRY>();
        while count > 0 {
            let last = mapped
                .get::<ENTRY>(count - 1)
                .map(IndexEntry::decode);
            match last {
                Some(entry) if entry.relative_offset as u64 == count - 1 => break,
                _ => count -= 1,
            }
        }
        count * ENTRY_WIDTH
    }
}
