//! Store
//!
//! Append-only file of length-prefixed payloads.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────────┬──────────────────────────┐
//! │ Length (8, BE)   │ Payload (Length bytes)   │
//! └──────────────────┴──────────────────────────┘
//! ```
//! A frame's position is the byte offset of its length prefix.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{LogError, Result};

/// Width of the length prefix in front of every payload
pub const LEN_WIDTH: u64 = 8;

/// Append-only, length-prefixed record file
///
/// ## Concurrency:
/// - Every operation takes the store's own mutex
/// - Reads flush the write buffer first, so buffered frames are visible
pub struct Store {
    /// Path of the backing file
    path: PathBuf,

    /// Writer and cursor; `writer` is `None` once closed
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    /// Buffered writer over the file (opened in append mode)
    writer: Option<BufWriter<File>>,
    /// Write cursor, including buffered-but-unflushed bytes
    size: u64,
}

impl Store {
    /// Open or create a store file
    ///
    /// The current file length becomes the write cursor, so an existing
    /// store continues where it left off.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(StoreInner {
                writer: Some(BufWriter::new(file)),
                size,
            }),
        })
    }

    /// Append a payload
    ///
    /// Returns `(bytes_written, position)` where `bytes_written` includes the
    /// 8-byte prefix and `position` is where the frame starts.
    ///
    /// A failed write is rolled back to `position`, so later frames start
    /// where their returned position says. If the rollback itself fails the
    /// store is closed.
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u64)> {
        let mut inner = self.inner.lock();
        let position = inner.size;
        let writer = Self::writer(&mut inner.writer, &self.path)?;

        if let Err(e) = Self::write_frame(writer, payload) {
            tracing::warn!(
                "Store {}: append at {} failed, rolling back: {}",
                self.path.display(),
                position,
                e
            );
            if let Err(rollback) = Self::roll_back(&mut inner, position) {
                tracing::error!(
                    "Store {}: rollback to {} failed, closing store: {}",
                    self.path.display(),
                    position,
                    rollback
                );
            }
            return Err(e.into());
        }

        let written = LEN_WIDTH + payload.len() as u64;
        inner.size += written;
        Ok((written, position))
    }

    /// Read the payload of the frame starting at `position`
    ///
    /// Fails with `UnexpectedEof` if the frame runs past the end of the file.
    pub fn read(&self, position: u64) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock();
        let size = inner.size;
        let writer = Self::writer(&mut inner.writer, &self.path)?;
        writer.flush()?;

        let file = writer.get_mut();
        let len = Self::frame_len(file, position, size)?.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("frame at {} runs past end of store ({} bytes)", position, size),
            )
        })?;

        let mut payload = vec![0u8; len as usize];
        file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// End position of the complete frame starting at `position`
    ///
    /// `None` when the prefix or the payload runs past the end of the store.
    pub fn frame_end(&self, position: u64) -> Result<Option<u64>> {
        let mut inner = self.inner.lock();
        let size = inner.size;
        let writer = Self::writer(&mut inner.writer, &self.path)?;
        writer.flush()?;

        let len = Self::frame_len(writer.get_mut(), position, size)?;
        Ok(len.map(|len| position + LEN_WIDTH + len))
    }

    /// Cut the store back to `size` bytes, discarding everything after it
    pub(crate) fn truncate(&self, size: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        if size >= inner.size {
            return Ok(());
        }
        let writer = Self::writer(&mut inner.writer, &self.path)?;
        writer.flush()?;
        writer.get_ref().set_len(size)?;
        inner.size = size;
        Ok(())
    }

    /// Raw positional read of up to `buf.len()` bytes starting at `offset`
    ///
    /// Returns the number of bytes read; `0` means end of store.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut inner = self.inner.lock();
        let writer = Self::writer(&mut inner.writer, &self.path)?;
        writer.flush()?;

        let file = writer.get_mut();
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Flush buffered frames and fsync the file
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let writer = Self::writer(&mut inner.writer, &self.path)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Flush buffered frames and release the file
    ///
    /// Closing an already-closed store is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(mut writer) = inner.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Current write cursor (file length plus buffered bytes)
    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_frame(writer: &mut BufWriter<File>, payload: &[u8]) -> io::Result<()> {
        writer.write_all(&(payload.len() as u64).to_be_bytes())?;
        writer.write_all(payload)
    }

    /// Length of the frame at `position`, leaving `file` positioned at its payload
    ///
    /// Lengths reaching past `size` are rejected before anything is allocated.
    fn frame_len(file: &mut File, position: u64, size: u64) -> Result<Option<u64>> {
        let payload_start = match position.checked_add(LEN_WIDTH) {
            Some(start) if start <= size => start,
            _ => return Ok(None),
        };

        file.seek(SeekFrom::Start(position))?;
        let mut len_buf = [0u8; LEN_WIDTH as usize];
        file.read_exact(&mut len_buf)?;
        let len = u64::from_be_bytes(len_buf);

        match payload_start.checked_add(len) {
            Some(end) if end <= size => Ok(Some(len)),
            _ => Ok(None),
        }
    }

    /// Discard a partially written frame so the file ends at `position` again
    ///
    /// Buffered bytes belonging to earlier frames are written out first; the
    /// partial frame is cut off with `set_len`. The writer stays `None` if
    /// any step fails.
    fn roll_back(inner: &mut StoreInner, position: u64) -> Result<()> {
        let Some(writer) = inner.writer.take() else {
            return Ok(());
        };
        let (mut file, buffered) = writer.into_parts();
        let buffered = buffered.unwrap_or_else(|panicked| panicked.into_inner());

        let on_disk = file.metadata()?.len();
        if position > on_disk {
            let keep = ((position - on_disk) as usize).min(buffered.len());
            file.write_all(&buffered[..keep])?;
        }
        file.set_len(position)?;

        inner.writer = Some(BufWriter::new(file));
        inner.size = position;
        Ok(())
    }

    fn writer<'a>(writer: &'a mut Option<BufWriter<File>>, path: &Path) -> Result<&'a mut BufWriter<File>> {
        writer.as_mut().ok_or_else(|| LogError::Closed(path.to_path_buf()))
    }
}
