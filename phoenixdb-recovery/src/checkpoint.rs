//! Checkpointer
//!
//! Periodically rewrites live values back into the WAL as
//! `SETCHECKPOINT` records. The records change nothing in the store;
//! their point is downstream: when the indexer meets one it collapses
//! that key's chain to a single synthetic SET, which bounds both the
//! indexed log's growth and the work a future recovery must do.
//!
//! A **full** round covers every live key and, when it completes,
//! persists the WAL offset captured at its start as the
//! checkpoint-offset (the fallback rebuild anchor). An **MFU** round
//! covers only the keys the access counter saw since the last round and
//! never advances the checkpoint-offset.
//!
//! Rounds are scheduled by a start delay and an interval; with
//! self-tuning on, each round's duration feeds the next interval:
//! `max(60, duration / 2)` seconds, so cheap checkpoints run more often
//! and expensive ones back off.

use crate::access_counter::AccessCounter;
use crate::metrics::RecoveryMetrics;
use crate::ports::CheckpointPort;
use crate::telemetry::{CheckpointMode, CheckpointReport, TelemetryHub};
use crate::worker::CancellationToken;

use phoenixdb_core::{Config, Result};
use phoenixdb_storage::meta::OffsetFile;

use log::{error, info};

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Lower bound for a self-tuned interval, in seconds
const SELFTUNE_FLOOR_SECS: u64 = 60;

/// Derives the next round's interval from the last round's duration
pub fn self_tuned_interval(last_round: Duration) -> Duration {
    Duration::from_secs((last_round.as_secs() / 2).max(SELFTUNE_FLOOR_SECS))
}

/// Background checkpoint worker
pub struct Checkpointer {
    port: Arc<dyn CheckpointPort>,
    access: Arc<AccessCounter>,
    checkpoint_offset: OffsetFile,
    first_delay: Duration,
    interval: Duration,
    /// Rounds to run; 0 = unbounded
    rounds: u32,
    selftune: bool,
    only_mfu: bool,
    metrics: Arc<RecoveryMetrics>,
    telemetry: Arc<TelemetryHub>,
}

impl Checkpointer {
    pub fn new(
        config: &Config,
        port: Arc<dyn CheckpointPort>,
        access: Arc<AccessCounter>,
        metrics: Arc<RecoveryMetrics>,
        telemetry: Arc<TelemetryHub>,
    ) -> Self {
        Self {
            port,
            access,
            checkpoint_offset: OffsetFile::new(config.checkpoint_offset_path()),
            first_delay: config.first_checkpoint_delay,
            interval: config.checkpoint_interval,
            rounds: config.checkpoint_rounds,
            selftune: config.selftune_checkpoint_interval,
            only_mfu: config.checkpoints_only_mfu,
            metrics,
            telemetry,
        }
    }

    /// Worker loop: wait for the first start time, then run rounds
    pub fn run(&self, token: CancellationToken) {
        if !token.sleep_for(self.first_delay) {
            return;
        }

        let mut interval = self.interval;
        let mut round = 0u64;
        loop {
            round += 1;
            match self.run_round(round, &token) {
                Ok(report) => {
                    if self.selftune {
                        interval = self_tuned_interval(report.duration);
                    }
                }
                Err(e) => error!("checkpoint round {} failed: {}", round, e),
            }

            if self.rounds != 0 && round >= u64::from(self.rounds) {
                info!("checkpointer finished its {} configured rounds", self.rounds);
                return;
            }
            if !token.sleep_for(interval) {
                return;
            }
        }
    }

    /// Runs one checkpoint round
    ///
    /// Cancellation breaks out of the key iteration but the
    /// `CHECKPOINTEND` marker is still emitted; a cancelled full round
    /// does not move the checkpoint-offset.
    pub fn run_round(&self, round: u64, token: &CancellationToken) -> Result<CheckpointReport> {
        let started_at = SystemTime::now();
        let started = Instant::now();
        let start_offset = self.port.wal_end_offset();

        let (keys, outcome) = if self.only_mfu {
            self.mfu_pass(token)
        } else {
            self.full_pass(token)
        };
        let cancelled = matches!(outcome, PassOutcome::Cancelled);

        // The end marker closes the round even when it was cut short.
        self.port.submit_checkpoint_end(round)?;
        outcome.into_result()?;

        if !cancelled && !self.only_mfu {
            self.checkpoint_offset.store(start_offset)?;
        }

        self.metrics.record_checkpoint_round(keys);
        let report = CheckpointReport {
            round,
            mode: if self.only_mfu {
                CheckpointMode::Mfu
            } else {
                CheckpointMode::Full
            },
            keys,
            started_at,
            duration: started.elapsed(),
            cancelled,
        };
        info!(
            "checkpoint round {} ({:?}): {} keys in {:?}{}",
            round,
            report.mode,
            keys,
            report.duration,
            if cancelled { " (cancelled)" } else { "" }
        );
        self.telemetry.publish_checkpoint(report.clone());
        Ok(report)
    }

    fn full_pass(&self, token: &CancellationToken) -> (u64, PassOutcome) {
        let mut written = 0u64;
        for key in self.port.live_keys() {
            if token.is_cancelled() {
                return (written, PassOutcome::Cancelled);
            }
            let value = match self.port.value_of(&key) {
                Some(value) => value,
                None => continue, // deleted since the snapshot
            };
            if let Err(e) = self.port.submit_checkpoint_set(&key, &value) {
                return (written, PassOutcome::Failed(e));
            }
            written += 1;
        }
        (written, PassOutcome::Completed)
    }

    /// Checkpoints the counted working set, freezing the logger flag
    /// for the duration of the scan
    ///
    /// Each key's live value is re-emitted (a key counted but deleted
    /// since is skipped); the counter map is cleared by the drain.
    fn mfu_pass(&self, token: &CancellationToken) -> (u64, PassOutcome) {
        self.access.set_enabled(false);
        let counted = self.access.drain();

        let mut written = 0u64;
        let mut outcome = PassOutcome::Completed;
        for (key, _count) in counted {
            if token.is_cancelled() {
                outcome = PassOutcome::Cancelled;
                break;
            }
            let value = match self.port.value_of(&key) {
                Some(value) => value,
                None => continue,
            };
            if let Err(e) = self.port.submit_checkpoint_set(&key, &value) {
                outcome = PassOutcome::Failed(e);
                break;
            }
            written += 1;
        }

        self.access.set_enabled(true);
        (written, outcome)
    }
}

enum PassOutcome {
    Completed,
    Cancelled,
    Failed(phoenixdb_core::Error),
}

impl PassOutcome {
    fn into_result(self) -> Result<()> {
        match self {
            Self::Failed(e) => Err(e),
            _ => Ok(()),
        }
    }
}
