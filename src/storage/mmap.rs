//! Memory-mapped fixed-capacity buffer
//!
//! A file preallocated to `capacity` bytes and mapped read/write, of which
//! only a prefix of `used` bytes holds data. Entries are fixed-width and
//! appended contiguously; access is bounds-checked against `used`.

use std::fs::File;

use memmap2::MmapMut;

use crate::error::Result;

/// Preallocated, memory-mapped region with separate capacity and used sizes
pub(crate) struct MappedFile {
    /// Backing file; owned exclusively, released by `close`
    file: File,
    /// Shared read/write mapping over the full capacity
    mmap: MmapMut,
    /// Bytes holding entries (prefix of the mapping)
    used: u64,
}

impl MappedFile {
    /// Grow `file` to `capacity` and map it
    ///
    /// The current file length becomes the initial `used` size, clamped to
    /// `capacity`. Callers validate the recovered prefix themselves.
    pub fn open(file: File, capacity: u64) -> Result<Self> {
        let used = file.metadata()?.len().min(capacity);
        file.set_len(capacity)?;

        // SAFETY: the file is owned by this struct for the lifetime of the
        // mapping and is never resized while mapped.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self { file, mmap, used })
    }

    pub fn capacity(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    /// Number of whole `W`-byte entries in the used prefix
    pub fn entries<const W: usize>(&self) -> u64 {
        self.used / W as u64
    }

    /// Copy out entry `slot`, or `None` if it lies beyond the used prefix
    pub fn get<const W: usize>(&self, slot: u64) -> Option<[u8; W]> {
        let start = slot.checked_mul(W as u64)?;
        let end = start.checked_add(W as u64)?;
        if end > self.used {
            return None;
        }
        let mut entry = [0u8; W];
        entry.copy_from_slice(&self.mmap[start as usize..end as usize]);
        Some(entry)
    }

    /// Append one entry after the used prefix
    ///
    /// Returns `false` without writing when the mapping cannot hold it.
    pub fn push<const W: usize>(&mut self, entry: &[u8; W]) -> bool {
        let start = self.used;
        let end = start + W as u64;
        if end > self.capacity() {
            return false;
        }
        self.mmap[start as usize..end as usize].copy_from_slice(entry);
        self.used = end;
        true
    }

    /// Shrink the logical used prefix (never grows it)
    pub fn truncate_used(&mut self, used: u64) {
        self.used = self.used.min(used);
    }

    /// Flush the mapping, fsync the file, then cut it down to `used`
    ///
    /// The mapping is dropped before the file shrinks.
    pub fn close(self) -> Result<()> {
        let Self { file, mmap, used } = self;
        mmap.flush()?;
        file.sync_all()?;
        drop(mmap);
        file.set_len(used)?;
        file.sync_all()?;
        Ok(())
    }
}
