//! Recovery metrics
//!
//! Counters shared by every recovery component. All fields are atomic,
//! so readers never block the hot paths that bump them. The
//! inconsistent-load counter is part of the engine's contract: a redo
//! submission that fails is counted here (and the key is still marked
//! restored) rather than surfaced to the client thread.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing recovery progress within the current epoch
#[derive(Debug, Default)]
pub struct RecoveryMetrics {
    incremental_loads: AtomicU64,
    on_demand_loads: AtomicU64,
    on_demand_misses: AtomicU64,
    inconsistent_loads: AtomicU64,
    indexed_records: AtomicU64,
    indexed_batches: AtomicU64,
    checkpoint_rounds: AtomicU64,
    checkpointed_keys: AtomicU64,
    compactions: AtomicU64,
}

impl RecoveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a key replayed by the incremental restorer
    pub fn record_incremental_load(&self) {
        self.incremental_loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a key reconstructed by the on-demand path
    pub fn record_on_demand_load(&self) {
        self.on_demand_loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an on-demand probe for a key with no indexed history
    pub fn record_on_demand_miss(&self) {
        self.on_demand_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a key whose redo could not be completed
    pub fn record_inconsistent_load(&self) {
        self.inconsistent_loads.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a drained indexing batch of `records` WAL records
    pub fn record_indexed_batch(&self, records: u64) {
        self.indexed_batches.fetch_add(1, Ordering::Relaxed);
        self.indexed_records.fetch_add(records, Ordering::Relaxed);
    }

    /// Records a finished checkpoint round that wrote `keys` keys
    pub fn record_checkpoint_round(&self, keys: u64) {
        self.checkpoint_rounds.fetch_add(1, Ordering::Relaxed);
        self.checkpointed_keys.fetch_add(keys, Ordering::Relaxed);
    }

    /// Records an indexed-log compaction
    pub fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incremental_loads(&self) -> u64 {
        self.incremental_loads.load(Ordering::Relaxed)
    }

    pub fn on_demand_loads(&self) -> u64 {
        self.on_demand_loads.load(Ordering::Relaxed)
    }

    pub fn on_demand_misses(&self) -> u64 {
        self.on_demand_misses.load(Ordering::Relaxed)
    }

    pub fn inconsistent_loads(&self) -> u64 {
        self.inconsistent_loads.load(Ordering::Relaxed)
    }

    pub fn indexed_records(&self) -> u64 {
        self.indexed_records.load(Ordering::Relaxed)
    }

    pub fn indexed_batches(&self) -> u64 {
        self.indexed_batches.load(Ordering::Relaxed)
    }

    pub fn checkpoint_rounds(&self) -> u64 {
        self.checkpoint_rounds.load(Ordering::Relaxed)
    }

    pub fn checkpointed_keys(&self) -> u64 {
        self.checkpointed_keys.load(Ordering::Relaxed)
    }

    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    /// Keys materialized by either restore path
    pub fn total_loads(&self) -> u64 {
        self.incremental_loads() + self.on_demand_loads()
    }
}
