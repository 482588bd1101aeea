//! Access counters for MFU checkpointing
//!
//! While MFU mode is on, the command path bumps a per-key counter for
//! every SET/INCR. The checkpointer freezes the working set by turning
//! the logger flag off, drains the counts, checkpoints those keys, and
//! turns the flag back on. The flag is the writer/reader handoff: the
//! command path only writes while it is on, the checkpointer only
//! drains while it is off.

use phoenixdb_core::Key;

use parking_lot::Mutex;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Per-key access counts since the last MFU checkpoint
pub struct AccessCounter {
    enabled: AtomicBool,
    counts: Mutex<HashMap<Key, u64>>,
}

impl AccessCounter {
    /// Creates the counter; `enabled` is false unless MFU mode is on
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Toggles the logger flag
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Counts one access to `key`; a no-op while the logger is off
    pub fn record(&self, key: &[u8]) {
        if !self.is_enabled() {
            return;
        }
        let mut counts = self.counts.lock();
        *counts.entry(key.to_vec()).or_insert(0) += 1;
    }

    /// Takes and clears the counted working set
    pub fn drain(&self) -> Vec<(Key, u64)> {
        let mut counts = self.counts.lock();
        counts.drain().collect()
    }

    /// Number of distinct keys counted so far
    pub fn len(&self) -> usize {
        self.counts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
