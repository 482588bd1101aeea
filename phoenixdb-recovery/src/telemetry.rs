//! Telemetry streams
//!
//! Workers publish small report structs describing what they just did;
//! a flusher worker drains the streams into bounded ring buffers that
//! operators (and tests) can inspect. Streams are bounded
//! multi-producer/single-consumer channels: a full stream drops the
//! report and counts the drop instead of blocking a worker.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::debug;
use parking_lot::Mutex;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

/// Capacity of each stream's channel
const STREAM_CAPACITY: usize = 1024;

/// Reports retained per stream after flushing
const RETAINED_REPORTS: usize = 256;

/// One drained indexing batch
#[derive(Debug, Clone)]
pub struct IndexingReport {
    /// Records applied to the indexed log in this batch
    pub records: u64,
    /// Indexed-offset after the batch
    pub wal_offset: u64,
    pub duration: Duration,
}

/// Which path materialized keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreKind {
    Incremental,
    OnDemand,
}

/// A restore progress report
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub kind: RestoreKind,
    pub keys: u64,
    pub duration: Duration,
}

/// Checkpoint mode of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointMode {
    Full,
    Mfu,
}

/// One checkpoint round
///
/// `started_at` and `duration` are the round's own measurements, taken
/// when the round begins and ends.
#[derive(Debug, Clone)]
pub struct CheckpointReport {
    pub round: u64,
    pub mode: CheckpointMode,
    pub keys: u64,
    pub started_at: SystemTime,
    pub duration: Duration,
    pub cancelled: bool,
}

struct Stream<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    recent: Mutex<VecDeque<T>>,
}

impl<T: Clone> Stream<T> {
    fn new() -> Self {
        let (tx, rx) = bounded(STREAM_CAPACITY);
        Self {
            tx,
            rx,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    fn publish(&self, report: T, dropped: &AtomicU64) {
        match self.tx.try_send(report) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn flush(&self) -> usize {
        let mut recent = self.recent.lock();
        let mut moved = 0;
        while let Ok(report) = self.rx.try_recv() {
            if recent.len() == RETAINED_REPORTS {
                recent.pop_front();
            }
            recent.push_back(report);
            moved += 1;
        }
        moved
    }

    fn snapshot(&self) -> Vec<T> {
        self.recent.lock().iter().cloned().collect()
    }
}

/// All telemetry streams of one engine
pub struct TelemetryHub {
    indexing: Stream<IndexingReport>,
    restore: Stream<RestoreReport>,
    checkpoint: Stream<CheckpointReport>,
    dropped: AtomicU64,
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryHub {
    pub fn new() -> Self {
        Self {
            indexing: Stream::new(),
            restore: Stream::new(),
            checkpoint: Stream::new(),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn publish_indexing(&self, report: IndexingReport) {
        self.indexing.publish(report, &self.dropped);
    }

    pub fn publish_restore(&self, report: RestoreReport) {
        self.restore.publish(report, &self.dropped);
    }

    pub fn publish_checkpoint(&self, report: CheckpointReport) {
        self.checkpoint.publish(report, &self.dropped);
    }

    /// Drains all streams into their ring buffers
    pub fn flush(&self) {
        let moved =
            self.indexing.flush() + self.restore.flush() + self.checkpoint.flush();
        if moved > 0 {
            debug!("telemetry: flushed {} reports", moved);
        }
    }

    /// Recently flushed indexing reports, oldest first
    pub fn recent_indexing(&self) -> Vec<IndexingReport> {
        self.indexing.snapshot()
    }

    /// Recently flushed restore reports, oldest first
    pub fn recent_restores(&self) -> Vec<RestoreReport> {
        self.restore.snapshot()
    }

    /// Recently flushed checkpoint reports, oldest first
    pub fn recent_checkpoints(&self) -> Vec<CheckpointReport> {
        self.checkpoint.snapshot()
    }

    /// Reports lost to full streams
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
