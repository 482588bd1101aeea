//! Engine lifecycle
//!
//! [`RecoveryEngine`] is the explicit owner of everything the
//! subsystem shares: configuration, file handles, the restored-key
//! set, metrics, telemetry and the worker threads. Startup follows a
//! fixed order — open or rebuild the indexed log, run catch-up
//! indexing to the WAL's end, wire the on-demand restorer into the
//! store, then start the background workers — and only returns once
//! the store can serve traffic. Shutdown is the mirror image: signal
//! every worker, wait for each to exit, sync and close the indexed
//! log, and stamp the shutdown time for an external restart harness.

use crate::access_counter::AccessCounter;
use crate::checkpoint::Checkpointer;
use crate::incremental::IncrementalRestorer;
use crate::indexer::{self, Indexer, SyncIndexer};
use crate::metrics::RecoveryMetrics;
use crate::on_demand::OnDemandRestorer;
use crate::ports::{CheckpointPort, RedoPort};
use crate::restored_set::RestoredSet;
use crate::store::MemoryStore;
use crate::telemetry::TelemetryHub;
use crate::worker::WorkerHandle;

use phoenixdb_core::{Config, IndexerStart, Result, SyncMode};
use phoenixdb_storage::indexed_log::IndexedLog;
use phoenixdb_storage::meta::OffsetFile;
use phoenixdb_storage::wal::WalWriter;

use log::{error, info};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How often the telemetry flusher drains the streams
const TELEMETRY_FLUSH_INTERVAL: Duration = Duration::from_millis(500);

/// The instant-recovery engine and its live store
pub struct RecoveryEngine {
    config: Config,
    wal: Arc<WalWriter>,
    store: Arc<MemoryStore>,
    indexed_log: Option<Arc<IndexedLog>>,
    restored: Option<Arc<RestoredSet>>,
    access: Arc<AccessCounter>,
    metrics: Arc<RecoveryMetrics>,
    telemetry: Arc<TelemetryHub>,
    workers: Vec<WorkerHandle>,
    stop_requested: Arc<AtomicBool>,
}

impl RecoveryEngine {
    /// Validates the configuration, recovers state, and starts the
    /// background workers
    ///
    /// When this returns the store is ready: the indexed log reflects
    /// the whole WAL (catch-up indexing runs synchronously here) and
    /// any key a command touches will be materialized first.
    pub fn start(config: Config) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(RecoveryMetrics::new());
        let telemetry = Arc::new(TelemetryHub::new());
        let access = Arc::new(AccessCounter::new(
            config.checkpoints_enabled && config.checkpoints_only_mfu,
        ));
        let stop_requested = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::new();

        // Catch-up indexing must run before the WAL writer opens: it
        // also discards any partial record a crash left at the WAL's
        // tail, and this epoch's appends have to start at that clean
        // boundary.
        let recovered = if config.instant_recovery {
            let logs = indexer::prepare_logs(&config)?;
            let log_indexer = Arc::new(Indexer::new(
                &config,
                &logs,
                Arc::clone(&metrics),
                Arc::clone(&telemetry),
            ));
            log_indexer.catch_up()?;
            Some((logs, log_indexer))
        } else {
            None
        };

        let wal = Arc::new(WalWriter::open(&config.wal_path, SyncMode::Normal)?);
        let store = MemoryStore::new(Arc::clone(&wal), Arc::clone(&access));

        let (indexed_log, restored) = if let Some((logs, log_indexer)) = recovered {
            // In synchronous mode every WAL append indexes inline, so
            // the observer must be in place before anything — client or
            // restorer — can write.
            if config.synchronous_indexing {
                let sync_indexer =
                    Arc::new(SyncIndexer::new(&config, &logs, Arc::clone(&metrics)));
                wal.set_observer(sync_indexer);
                info!("synchronous indexing installed on the WAL writer");
            }

            let restored = Arc::new(RestoredSet::new());
            let on_demand = Arc::new(OnDemandRestorer::new(
                Arc::clone(&logs.primary),
                Arc::clone(&restored),
                Arc::clone(&store) as Arc<dyn RedoPort>,
                Arc::clone(&metrics),
            ));
            store.attach_recovery(on_demand);

            let incremental = IncrementalRestorer::new(
                Arc::clone(&logs.primary),
                Arc::clone(&restored),
                Arc::clone(&store) as Arc<dyn RedoPort>,
                Arc::clone(&metrics),
                Arc::clone(&telemetry),
            );

            match config.indexer_start {
                IndexerStart::BeforeRestore => {
                    spawn_async_indexer(&config, log_indexer, &mut workers)?;
                    spawn_incremental(incremental, &mut workers)?;
                }
                IndexerStart::AfterRestore => {
                    spawn_incremental(incremental, &mut workers)?;
                    spawn_async_indexer(&config, log_indexer, &mut workers)?;
                }
            }

            (Some(Arc::clone(&logs.primary)), Some(restored))
        } else {
            info!("instant recovery is OFF; starting with an empty store");
            (None, None)
        };

        if config.checkpoints_enabled {
            let checkpointer = Checkpointer::new(
                &config,
                Arc::clone(&store) as Arc<dyn CheckpointPort>,
                Arc::clone(&access),
                Arc::clone(&metrics),
                Arc::clone(&telemetry),
            );
            workers.push(WorkerHandle::spawn("checkpointer", move |token| {
                checkpointer.run(token)
            })?);
        }

        let hub = Arc::clone(&telemetry);
        workers.push(WorkerHandle::spawn("telemetry-flusher", move |token| {
            while token.sleep_for(TELEMETRY_FLUSH_INTERVAL) {
                hub.flush();
            }
            hub.flush();
        })?);

        if let Some(stop_after) = config.stop_after {
            let flag = Arc::clone(&stop_requested);
            workers.push(WorkerHandle::spawn("monitor", move |token| {
                if token.sleep_for(stop_after) {
                    info!("stop-after timeout reached; requesting shutdown");
                    flag.store(true, Ordering::SeqCst);
                }
            })?);
        }

        info!(
            "engine started ({} workers, instant recovery {})",
            workers.len(),
            if config.instant_recovery { "ON" } else { "OFF" }
        );

        Ok(Self {
            config,
            wal,
            store,
            indexed_log,
            restored,
            access,
            metrics,
            telemetry,
            workers,
            stop_requested,
        })
    }

    /// Signals every worker, waits for them, and flushes state
    ///
    /// After a clean shutdown a fresh [`start`](Self::start) over the
    /// same files reproduces the pre-shutdown store.
    pub fn shutdown(mut self) -> Result<()> {
        info!("engine shutting down");

        for worker in &self.workers {
            worker.signal();
        }
        for worker in self.workers.drain(..) {
            worker.join();
        }

        self.wal.clear_observer();
        self.wal.sync()?;
        if let Some(log) = &self.indexed_log {
            log.close()?;
        }
        self.telemetry.flush();

        OffsetFile::new(self.config.shutdown_stamp_path()).store(unix_micros())?;
        info!("engine shut down cleanly");
        Ok(())
    }

    /// The live store clients talk to
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<RecoveryMetrics> {
        &self.metrics
    }

    pub fn telemetry(&self) -> &Arc<TelemetryHub> {
        &self.telemetry
    }

    pub fn access_counter(&self) -> &Arc<AccessCounter> {
        &self.access
    }

    /// The primary indexed log, when instant recovery is on
    pub fn indexed_log(&self) -> Option<&Arc<IndexedLog>> {
        self.indexed_log.as_ref()
    }

    /// Keys materialized so far this epoch
    pub fn restored_key_count(&self) -> usize {
        self.restored.as_ref().map(|set| set.len()).unwrap_or(0)
    }

    /// Set by the monitor worker once the stop-after timeout fires;
    /// the embedder polls this and calls [`shutdown`](Self::shutdown)
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn spawn_async_indexer(
    config: &Config,
    log_indexer: Arc<Indexer>,
    workers: &mut Vec<WorkerHandle>,
) -> Result<()> {
    if config.synchronous_indexing {
        return Ok(()); // inline indexing is already installed
    }
    workers.push(WorkerHandle::spawn("indexer", move |token| {
        log_indexer.run(token)
    })?);
    Ok(())
}

fn spawn_incremental(
    incremental: IncrementalRestorer,
    workers: &mut Vec<WorkerHandle>,
) -> Result<()> {
    workers.push(WorkerHandle::spawn("incremental-restorer", move |token| {
        if let Err(e) = incremental.run(&token) {
            error!("incremental restore failed: {}", e);
        }
    })?);
    Ok(())
}

fn unix_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}
