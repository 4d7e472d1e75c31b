//! Log
//!
//! Ordered collection of segments presenting one contiguous,
//! offset-addressed append log.
//!
//! ## Responsibilities
//! - Discover existing segments on startup (or bootstrap an empty one)
//! - Route appends to the active segment and rotate when it maxes out
//! - Route reads to the segment whose range holds the offset
//! - Drop fully-acknowledged segments (truncate), export raw bytes (reader)

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{LogError, Result};
use crate::record::Record;

use super::reader::LogReader;
use super::scan;
use super::segment::Segment;

/// Segmented commit log
///
/// ## Concurrency:
/// - `segments`: Protected by RwLock
///   - append / truncate / close / reset take it exclusively
///   - read / lowest_offset / highest_offset / reader share it
/// - Stores and indexes carry their own locks underneath
/// - All methods use `&self`
pub struct Log {
    /// Directory holding the segment files
    dir: PathBuf,

    /// Normalized configuration
    config: Config,

    /// Segments ordered by ascending base offset; the last one is active
    segments: RwLock<Vec<Segment>>,
}

impl Log {
    /// Open or create a log in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Collect base offsets from segment file names
    /// 3. Open each segment in ascending order (recovers next offsets)
    /// 4. Bootstrap one empty segment at `initial_offset` if none exist
    pub fn open(dir: impl AsRef<Path>, config: Config) -> Result<Self> {
        let config = config.normalized();
        config.validate()?;

        let dir = dir.as_ref().to_path_buf();
        let segments = Self::setup(&dir, &config)?;

        tracing::info!(
            "Opened log at {} with {} segment(s)",
            dir.display(),
            segments.len()
        );

        Ok(Self {
            dir,
            config,
            segments: RwLock::new(segments),
        })
    }

    /// Open with default config (convenience method)
    pub fn open_path(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(dir, Config::default())
    }

    /// Append a record, returning its offset
    ///
    /// If the append maxes out the active segment, a new segment starting
    /// one past the returned offset becomes active. The record is committed
    /// before rotation starts; a failed rotation is reported as
    /// `LogError::Rotation` and retried on the next append.
    pub fn append(&self, record: Record) -> Result<u64> {
        let mut segments = self.segments.write();

        let active = Self::active_mut(&mut segments, &self.dir)?;
        if active.is_maxed() {
            let base = active.next_offset();
            self.rotate(&mut segments, base)?;
        }

        let offset = Self::active_mut(&mut segments, &self.dir)?.append(record)?;

        if Self::active_mut(&mut segments, &self.dir)?.is_maxed() {
            if let Err(e) = self.rotate(&mut segments, offset + 1) {
                tracing::error!("Rotation after offset {} failed: {}", offset, e);
                return Err(LogError::Rotation {
                    offset,
                    source: Box::new(e),
                });
            }
        }

        Ok(offset)
    }

    /// Read the record stored at `offset`
    pub fn read(&self, offset: u64) -> Result<Record> {
        let segments = self.segments.read();
        segments
            .iter()
            .find(|s| s.contains(offset))
            .ok_or(LogError::OffsetOutOfRange { offset })?
            .read(offset)
    }

    /// Base offset of the oldest retained segment
    pub fn lowest_offset(&self) -> u64 {
        self.segments
            .read()
            .first()
            .map_or(self.config.segment.initial_offset, |s| s.base_offset())
    }

    /// Offset of the newest record (`next_offset - 1` of the active segment, `0` on underflow)
    pub fn highest_offset(&self) -> u64 {
        self.segments
            .read()
            .last()
            .map_or(0, |s| s.next_offset().saturating_sub(1))
    }

    /// Remove every segment whose records all sit at or below `lowest`
    ///
    /// If that includes the active segment, a fresh empty segment is opened
    /// at its next offset so appends continue without reusing offsets.
    ///
    /// If deleting a segment fails, whatever is left of it is reopened and
    /// kept along with every later segment, and the error is returned. If
    /// the replacement active segment cannot be opened, the log is left
    /// without segments and appends fail with `LogError::Closed`.
    pub fn truncate(&self, lowest: u64) -> Result<()> {
        let mut segments = self.segments.write();
        let active_base = segments.last().map(|s| s.base_offset());

        let mut pending = std::mem::take(&mut *segments).into_iter();
        let mut resume_at = None;
        let mut removed = 0usize;
        let mut failure = None;

        while let Some(segment) = pending.next() {
            let base = segment.base_offset();
            let is_active = Some(base) == active_base;
            let fully_acked = segment.next_offset() <= lowest.saturating_add(1);

            // An empty active segment holds nothing to discard
            if !fully_acked || (is_active && segment.is_empty()) {
                segments.push(segment);
                continue;
            }

            if is_active {
                resume_at = Some(segment.next_offset());
            }
            tracing::debug!(
                "Removing segment {} (next offset {})",
                base,
                segment.next_offset()
            );
            if let Err(e) = segment.remove() {
                tracing::error!("Failed to remove segment {}: {}", base, e);
                match Segment::open(&self.dir, base, self.config.segment) {
                    Ok(reopened) => {
                        // An intact active segment needs no replacement
                        if resume_at == Some(reopened.next_offset()) {
                            resume_at = None;
                        }
                        segments.push(reopened);
                    }
                    Err(reopen) => tracing::error!("Failed to reopen segment {}: {}", base, reopen),
                }
                segments.extend(pending.by_ref());
                failure = Some(e);
                break;
            }
            removed += 1;
        }

        if let Some(base) = resume_at {
            match Segment::open(&self.dir, base, self.config.segment) {
                Ok(segment) => segments.push(segment),
                Err(e) => {
                    tracing::error!("Log has no active segment: opening segment {} failed: {}", base, e);
                    return Err(failure.unwrap_or(e));
                }
            }
        }

        if removed > 0 {
            tracing::info!("Truncated {} segment(s) at or below offset {}", removed, lowest);
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stream the raw store bytes of every segment, oldest first
    pub fn reader(&self) -> LogReader {
        let segments = self.segments.read();
        LogReader::new(segments.iter().map(|s| s.store().clone()))
    }

    /// Flush and fsync every segment's store
    pub fn sync(&self) -> Result<()> {
        let segments = self.segments.read();
        for segment in segments.iter() {
            segment.sync()?;
        }
        Ok(())
    }

    /// Close every segment in order
    ///
    /// Stops at the first failure; later segments stay open.
    pub fn close(&self) -> Result<()> {
        let segments = self.segments.write();
        Self::close_all(&segments)
    }

    /// Close the log and delete its directory
    pub fn remove(&self) -> Result<()> {
        let mut segments = self.segments.write();
        Self::close_all(&segments)?;
        segments.clear();
        fs::remove_dir_all(&self.dir)?;
        Ok(())
    }

    /// Remove the log and start over with a single empty segment
    pub fn reset(&self) -> Result<()> {
        let mut segments = self.segments.write();
        Self::close_all(&segments)?;
        segments.clear();
        fs::remove_dir_all(&self.dir)?;

        *segments = Self::setup(&self.dir, &self.config)?;
        tracing::info!("Reset log at {}", self.dir.display());
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the log directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the number of segments
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Base offsets of all segments, ascending
    pub fn segment_base_offsets(&self) -> Vec<u64> {
        self.segments.read().iter().map(|s| s.base_offset()).collect()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Load existing segments from `dir`, or bootstrap the first one
    fn setup(dir: &Path, config: &Config) -> Result<Vec<Segment>> {
        fs::create_dir_all(dir)?;

        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if scan::parse_base_offset(&name).is_none() {
                tracing::warn!("Ignoring unrecognized file {} in {}", name, dir.display());
                continue;
            }
            names.push(name);
        }

        let mut segments = Vec::new();
        for base_offset in scan::base_offsets(&names) {
            segments.push(Segment::open(dir, base_offset, config.segment)?);
        }

        if segments.is_empty() {
            let initial = config.segment.initial_offset;
            tracing::debug!("Bootstrapping empty log at offset {}", initial);
            segments.push(Segment::open(dir, initial, config.segment)?);
        }

        Ok(segments)
    }

    /// Open a segment at `base_offset` and make it active
    fn rotate(&self, segments: &mut Vec<Segment>, base_offset: u64) -> Result<()> {
        let segment = Segment::open(&self.dir, base_offset, self.config.segment)?;
        tracing::info!("Rotated to new segment at offset {}", base_offset);
        segments.push(segment);
        Ok(())
    }

    /// The active segment; a log without segments has been removed
    fn active_mut<'a>(segments: &'a mut [Segment], dir: &Path) -> Result<&'a mut Segment> {
        segments
            .last_mut()
            .ok_or_else(|| LogError::Closed(dir.to_path_buf()))
    }

    fn close_all(segments: &[Segment]) -> Result<()> {
        for segment in segments {
            segment.close()?;
        }
        Ok(())
    }
}
