//! Incremental restorer
//!
//! The background half of instant recovery: walk the whole indexed log
//! after restart and replay every key into the live store. Keys the
//! on-demand path already materialized are skipped with the cursor's
//! next-distinct-key step, so the two paths converge on the full key
//! set without loading anything twice.

use crate::metrics::RecoveryMetrics;
use crate::ports::RedoPort;
use crate::replay::replay_chain;
use crate::restored_set::RestoredSet;
use crate::telemetry::{RestoreKind, RestoreReport, TelemetryHub};
use crate::worker::CancellationToken;

use phoenixdb_core::Result;
use phoenixdb_storage::indexed_log::IndexedLog;

use log::{info, warn};

use std::sync::Arc;
use std::time::Instant;

/// Background full replay of the indexed log
pub struct IncrementalRestorer {
    log: Arc<IndexedLog>,
    restored: Arc<RestoredSet>,
    redo: Arc<dyn RedoPort>,
    metrics: Arc<RecoveryMetrics>,
    telemetry: Arc<TelemetryHub>,
}

impl IncrementalRestorer {
    pub fn new(
        log: Arc<IndexedLog>,
        restored: Arc<RestoredSet>,
        redo: Arc<dyn RedoPort>,
        metrics: Arc<RecoveryMetrics>,
        telemetry: Arc<TelemetryHub>,
    ) -> Self {
        Self {
            log,
            restored,
            redo,
            metrics,
            telemetry,
        }
    }

    /// Replays every not-yet-restored key, stopping early on
    /// cancellation
    pub fn run(&self, token: &CancellationToken) -> Result<()> {
        let started = Instant::now();
        let mut loaded = 0u64;

        info!(
            "incremental restore starting over {} keys",
            self.log.key_count()
        );

        let mut cursor = self.log.scan();
        let mut pair = cursor.next()?;
        while let Some((key, _)) = pair {
            if token.is_cancelled() {
                info!("incremental restore cancelled after {} keys", loaded);
                break;
            }

            // Claimed by the on-demand path (or already live): skip the
            // rest of this key's duplicates.
            if !self.restored.try_claim(&key) {
                pair = cursor.next_distinct()?;
                continue;
            }

            let chain = self.log.lookup(&key)?;
            if chain.is_empty() {
                self.restored.complete(&key);
                pair = cursor.next_distinct()?;
                continue;
            }

            match replay_chain(&chain).and_then(|value| self.redo.submit_set_ir(&key, &value)) {
                Ok(()) => {
                    self.metrics.record_incremental_load();
                    loaded += 1;
                }
                Err(e) => {
                    warn!("incremental restore of a key failed ({})", e);
                    self.metrics.record_inconsistent_load();
                }
            }
            self.restored.complete(&key);

            pair = cursor.next_distinct()?;
        }

        let duration = started.elapsed();
        info!(
            "incremental restore finished: {} keys in {:?}",
            loaded, duration
        );
        self.telemetry.publish_restore(RestoreReport {
            kind: RestoreKind::Incremental,
            keys: loaded,
            duration,
        });
        Ok(())
    }
}
