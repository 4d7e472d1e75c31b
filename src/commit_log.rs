//! Collaborator interfaces
//!
//! The surfaces higher layers build on. A produce/consume service needs
//! `CommitLog`; a replication or retention agent needs `Retention`.

use crate::error::Result;
use crate::record::Record;
use crate::storage::Log;

/// Append and read records by offset
pub trait CommitLog {
    /// Append a record, returning the offset it was assigned
    fn append(&self, record: Record) -> Result<u64>;

    /// Read the record at `offset`
    fn read(&self, offset: u64) -> Result<Record>;
}

/// Inspect and prune the locally retained offset range
pub trait Retention {
    fn lowest_offset(&self) -> u64;

    fn highest_offset(&self) -> u64;

    /// Drop history whose records all sit at or below `lowest`
    fn truncate(&self, lowest: u64) -> Result<()>;
}

impl CommitLog for Log {
    fn append(&self, record: Record) -> Result<u64> {
        Log::append(self, record)
    }

    fn read(&self, offset: u64) -> Result<Record> {
        Log::read(self, offset)
    }
}

impl Retention for Log {
    fn lowest_offset(&self) -> u64 {
        Log::lowest_offset(self)
    }

    fn highest_offset(&self) -> u64 {
        Log::highest_offset(self)
    }

    fn truncate(&self, lowest: u64) -> Result<()> {
        Log::truncate(self, lowest)
    }
}
