//! Follower
//!
//! Streams records from a log as they are produced.
//!
//! A background thread reads offsets in increasing order and hands each
//! record to a bounded channel. An out-of-range read means the offset has not
//! been produced yet, so the thread waits `poll_interval` and tries again.
//! If the offset it wants has been truncated away, it skips ahead to the
//! lowest retained offset.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::commit_log::{CommitLog, Retention};
use crate::error::{LogError, Result};
use crate::record::Record;

/// Records buffered between the reader thread and the consumer
const CHANNEL_CAPACITY: usize = 64;

/// Handle to a running follower thread
pub struct Follower {
    records: Receiver<Record>,
    /// Dropping this sender tells the thread to stop
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl Follower {
    /// Start following `log` from offset `from`
    pub fn spawn<L>(log: Arc<L>, from: u64, poll_interval: Duration) -> Result<Self>
    where
        L: CommitLog + Retention + Send + Sync + 'static,
    {
        let (record_tx, record_rx) = channel::bounded(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("commitlog-follower".to_string())
            .spawn(move || follow(&*log, from, poll_interval, record_tx, shutdown_rx))?;

        Ok(Self {
            records: record_rx,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Block until the next record arrives
    ///
    /// Returns `None` once the follower thread has exited.
    pub fn recv(&self) -> Option<Record> {
        self.records.recv().ok()
    }

    /// Wait up to `timeout` for the next record
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Record> {
        match self.records.recv_timeout(timeout) {
            Ok(record) => Some(record),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// The underlying channel, for use in `select!`
    pub fn receiver(&self) -> &Receiver<Record> {
        &self.records
    }

    /// Stop the thread and return the error that ended it, if any
    pub fn stop(mut self) -> Result<()> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> Result<()> {
        self.shutdown.take();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| LogError::Io(std::io::Error::other("follower thread panicked")))?,
            None => Ok(()),
        }
    }
}

impl Drop for Follower {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_and_join() {
            tracing::warn!("Follower exited with error: {}", e);
        }
    }
}

fn follow<L>(
    log: &L,
    from: u64,
    poll_interval: Duration,
    records: Sender<Record>,
    shutdown: Receiver<()>,
) -> Result<()>
where
    L: CommitLog + Retention,
{
    let mut next = from;
    tracing::debug!("Follower started at offset {}", next);

    loop {
        match log.read(next) {
            Ok(record) => {
                crossbeam::select! {
                    send(records, record) -> sent => {
                        if sent.is_err() {
                            // Consumer went away
                            break;
                        }
                        next += 1;
                    }
                    recv(shutdown) -> _ => break,
                }
            }
            Err(e) if e.is_out_of_range() => {
                let lowest = log.lowest_offset();
                if next < lowest {
                    tracing::debug!("Follower skipping truncated offsets {}..{}", next, lowest);
                    next = lowest;
                    continue;
                }
                match shutdown.recv_timeout(poll_interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            }
            Err(e) => {
                tracing::error!("Follower failed reading offset {}: {}", next, e);
                return Err(e);
            }
        }
    }

    tracing::debug!("Follower stopped at offset {}", next);
    Ok(())
}
