//! On-demand restorer
//!
//! The foreground half of instant recovery. When a command touches a
//! key that has not been materialized since restart, the dispatcher
//! calls [`OnDemandRestorer::materialize`] first; the calling thread
//! reconstructs just that key from the indexed log and inserts it
//! before the command proceeds. That per-key pause is the price of
//! being available immediately instead of after a full replay.

use crate::metrics::RecoveryMetrics;
use crate::ports::RedoPort;
use crate::replay::replay_chain;
use crate::restored_set::{Claim, RestoredSet};

use phoenixdb_core::Result;
use phoenixdb_storage::indexed_log::IndexedLog;

use log::warn;

use std::sync::Arc;

/// What `materialize` found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialize {
    /// The key was reconstructed and inserted by this call
    Restored,
    /// The key has no indexed history; the command proceeds as a miss
    NotInLog,
    /// The key was already live (possibly after waiting out a
    /// concurrent loader)
    AlreadyLive,
}

/// Foreground per-key restorer
pub struct OnDemandRestorer {
    log: Arc<IndexedLog>,
    restored: Arc<RestoredSet>,
    redo: Arc<dyn RedoPort>,
    metrics: Arc<RecoveryMetrics>,
}

impl OnDemandRestorer {
    pub fn new(
        log: Arc<IndexedLog>,
        restored: Arc<RestoredSet>,
        redo: Arc<dyn RedoPort>,
        metrics: Arc<RecoveryMetrics>,
    ) -> Self {
        Self {
            log,
            restored,
            redo,
            metrics,
        }
    }

    /// Makes `key` live before the caller's command runs
    ///
    /// Returns promptly when the key is already restored; otherwise the
    /// caller claims the key and replays its chain inline. Whatever
    /// happens, the key ends up in the restored set — including the
    /// not-in-log case, so later accesses to an absent key stay in
    /// memory, and the failed-redo case, which is counted as an
    /// inconsistent load rather than retried forever.
    pub fn materialize(&self, key: &[u8]) -> Result<Materialize> {
        match self.restored.claim(key) {
            Claim::AlreadyRestored => return Ok(Materialize::AlreadyLive),
            Claim::Claimed => {}
        }

        let chain = match self.log.lookup(key) {
            Ok(chain) => chain,
            Err(e) => {
                self.restored.complete(key);
                return Err(e);
            }
        };

        if chain.is_empty() {
            self.metrics.record_on_demand_miss();
            self.restored.complete(key);
            return Ok(Materialize::NotInLog);
        }

        match replay_chain(&chain).and_then(|value| self.redo.submit_set_ir(key, &value)) {
            Ok(()) => self.metrics.record_on_demand_load(),
            Err(e) => {
                warn!(
                    "on-demand restore of key failed ({}); marking restored anyway",
                    e
                );
                self.metrics.record_inconsistent_load();
            }
        }
        self.restored.complete(key);
        Ok(Materialize::Restored)
    }
}
