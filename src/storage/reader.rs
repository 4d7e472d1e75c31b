//! Log Reader
//!
//! Sequential byte stream over the raw store files of every segment, oldest
//! first. The stream carries store frames untouched; consumers split it with
//! the `[len u64 BE][payload]` framing.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;

use super::store::Store;

/// Single-pass, non-seekable reader over concatenated store contents
pub struct LogReader {
    /// Stores still to be read, front is current
    stores: VecDeque<Arc<Store>>,
    /// Read position within the front store
    position: u64,
}

impl LogReader {
    pub(crate) fn new(stores: impl IntoIterator<Item = Arc<Store>>) -> Self {
        Self {
            stores: stores.into_iter().collect(),
            position: 0,
        }
    }
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while let Some(store) = self.stores.front() {
            let n = store.read_at(buf, self.position)?;
            if n > 0 {
                self.position += n as u64;
                return Ok(n);
            }
            // Current store exhausted, move on to the next segment
            self.stores.pop_front();
            self.position = 0;
        }
        Ok(0)
    }
}
