//! Log indexer
//!
//! Transforms the linear WAL into the indexed log. In the default
//! asynchronous mode a background worker tails the WAL, stages the
//! records it finds, and drains the stage into the indexed log; in
//! synchronous mode the same application table runs inline from the WAL
//! writer's append hook, one record at a time.
//!
//! ## Crash safety
//!
//! Every drain ends with the same two steps in the same order: sync the
//! indexed log, then overwrite the indexed-offset file. A crash can
//! therefore leave the offset stale but never ahead of durable data;
//! on restart the stale suffix of the WAL is simply indexed again (a
//! key may carry one extra copy of an in-flight record, which replay
//! tolerates).
//!
//! ## Application table
//!
//! | WAL record | Effect on the indexed log |
//! |---|---|
//! | `SET` / `INCR` / `SETIR` | append the original frame to the key's chain |
//! | `DEL` | delete all values for the key |
//! | `SETCHECKPOINT` | delete all values, then append a synthetic `SET` |
//! | `CHECKPOINTEND` | no data change; triggers a compaction pass |
//! | anything else | ignored |
//!
//! ## Failure semantics
//!
//! A frame cut short by end-of-file is an unflushed tail: the worker
//! sleeps and retries from the same boundary. A malformed frame means
//! the WAL itself is damaged; the indexer logs and halts rather than
//! silently skipping bytes. Indexed-log write failures are retried on
//! the next poll from the last durable offset, which the offset file
//! still points at.

use crate::metrics::RecoveryMetrics;
use crate::telemetry::{IndexingReport, TelemetryHub};
use crate::worker::CancellationToken;

use phoenixdb_core::{Config, Error, Result, WalOffset};
use phoenixdb_storage::indexed_log::{IndexedLog, OpenMode};
use phoenixdb_storage::meta::OffsetFile;
use phoenixdb_storage::wal::{AppendObserver, WalCommand, WalFrame, WalTailer};

use log::{debug, error, info, warn};

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Records staged per drain; bounds catch-up memory
const MAX_BATCH: usize = 4096;

/// Indexed log handles resolved by the startup fallback chain
pub struct PreparedLogs {
    pub primary: Arc<IndexedLog>,
    /// `None` when replication is off or was disabled by a replica
    /// promotion this epoch
    pub replica: Option<Arc<IndexedLog>>,
}

/// Opens the indexed log, falling back when it is missing or damaged
///
/// Order: open in place → rename a configured replica into place (and
/// disable replication for the epoch) → discard and rebuild forward
/// from the checkpoint offset (which is 0 when no checkpoint ever
/// completed). Whatever branch wins, the indexed-offset file is left
/// pointing where catch-up indexing must start.
pub fn prepare_logs(config: &Config) -> Result<PreparedLogs> {
    let structure = config.indexed_log_structure;
    let offset_file = OffsetFile::new(config.indexed_offset_path());
    let mut replication = config.replicate_indexed_log;

    let primary = if config.rebuild_indexed_log {
        info!("rebuild_indexedlog is ON; discarding the indexed log");
        rebuild_from_checkpoint(config, &offset_file)?
    } else {
        match try_open_existing(config) {
            Some(log) => log,
            None => match promote_replica(config, &offset_file)? {
                Some(log) => {
                    replication = false;
                    log
                }
                None => rebuild_from_checkpoint(config, &offset_file)?,
            },
        }
    };

    let replica = match (&config.replica_path, replication) {
        (Some(path), true) => Some(Arc::new(IndexedLog::open(
            path,
            OpenMode::ThreadShared,
            structure,
        )?)),
        _ => None,
    };

    Ok(PreparedLogs {
        primary: Arc::new(primary),
        replica,
    })
}

fn try_open_existing(config: &Config) -> Option<IndexedLog> {
    let path = &config.indexed_log_path;
    if !path.exists() {
        info!("indexed log {} is missing", path.display());
        return None;
    }
    match IndexedLog::open(path, OpenMode::ThreadShared, config.indexed_log_structure) {
        Ok(log) => Some(log),
        Err(e) => {
            warn!("indexed log {} failed to open: {}", path.display(), e);
            None
        }
    }
}

fn promote_replica(config: &Config, offset_file: &OffsetFile) -> Result<Option<IndexedLog>> {
    let replica_path = match &config.replica_path {
        Some(path) if config.replicate_indexed_log && path.exists() => path,
        _ => return Ok(None),
    };

    fs::rename(replica_path, &config.indexed_log_path)?;
    if let Some(replica_offset_path) = config.replica_offset_path() {
        offset_file.store(OffsetFile::new(replica_offset_path).load()?)?;
    }

    match IndexedLog::open(
        &config.indexed_log_path,
        OpenMode::ThreadShared,
        config.indexed_log_structure,
    ) {
        Ok(log) => {
            info!("promoted replica indexed log; replication disabled for this epoch");
            Ok(Some(log))
        }
        Err(e) => {
            warn!("promoted replica failed to open: {}", e);
            Ok(None)
        }
    }
}

fn rebuild_from_checkpoint(config: &Config, offset_file: &OffsetFile) -> Result<IndexedLog> {
    match fs::remove_file(&config.indexed_log_path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let start = OffsetFile::new(config.checkpoint_offset_path()).load()?;
    offset_file.store(start)?;
    info!("rebuilding indexed log forward from WAL offset {}", start);

    IndexedLog::open(
        &config.indexed_log_path,
        OpenMode::ThreadShared,
        config.indexed_log_structure,
    )
}

/// Applies the command table to the primary log and its replica
#[derive(Clone)]
struct IndexSink {
    log: Arc<IndexedLog>,
    replica: Option<Arc<IndexedLog>>,
}

impl IndexSink {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.log.put(key, value)?;
        if let Some(replica) = &self.replica {
            replica.put(key, value)?;
        }
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.log.delete(key)?;
        if let Some(replica) = &self.replica {
            replica.delete(key)?;
        }
        Ok(())
    }

    /// Applies one frame; returns whether it was a checkpoint-end marker
    fn apply(&self, frame: &WalFrame) -> Result<bool> {
        match frame.command() {
            WalCommand::Set { key, .. }
            | WalCommand::Incr { key }
            | WalCommand::SetIr { key, .. } => {
                self.put(key, &frame.encode())?;
            }
            WalCommand::Del { key } => {
                self.delete(key)?;
            }
            WalCommand::SetCheckpoint { key, value } => {
                // Collapse the key's history to one synthetic SET.
                let synthetic = WalFrame::set(key, value).encode();
                self.delete(key)?;
                self.put(key, &synthetic)?;
            }
            WalCommand::CheckpointEnd { .. } => return Ok(true),
            WalCommand::Other => {}
        }
        Ok(false)
    }

    fn sync(&self) -> Result<()> {
        self.log.sync()?;
        if let Some(replica) = &self.replica {
            replica.sync()?;
        }
        Ok(())
    }

    fn compact(&self) -> Result<u64> {
        let reclaimed = self.log.compact()?;
        if let Some(replica) = &self.replica {
            replica.compact()?;
        }
        Ok(reclaimed)
    }
}

/// Asynchronous indexer: stage WAL records, drain, sync, advance
pub struct Indexer {
    wal_path: PathBuf,
    sink: IndexSink,
    offset_file: OffsetFile,
    replica_offset_file: Option<OffsetFile>,
    poll_interval: Duration,
    metrics: Arc<RecoveryMetrics>,
    telemetry: Arc<TelemetryHub>,
}

impl Indexer {
    pub fn new(
        config: &Config,
        logs: &PreparedLogs,
        metrics: Arc<RecoveryMetrics>,
        telemetry: Arc<TelemetryHub>,
    ) -> Self {
        Self {
            wal_path: config.wal_path.clone(),
            sink: IndexSink {
                log: Arc::clone(&logs.primary),
                replica: logs.replica.as_ref().map(Arc::clone),
            },
            offset_file: OffsetFile::new(config.indexed_offset_path()),
            replica_offset_file: logs
                .replica
                .as_ref()
                .and(config.replica_offset_path())
                .map(OffsetFile::new),
            poll_interval: config.indexer_poll_interval,
            metrics,
            telemetry,
        }
    }

    /// Startup catch-up: index the WAL tail synchronously, to EOF
    ///
    /// Runs once, before the WAL writer is opened and the database is
    /// declared ready. A partially flushed record at the end of the
    /// WAL is discarded here — the file is truncated to the last full
    /// frame boundary, so this epoch's appends continue a clean
    /// stream. Errors abort startup; an impossible frame here means
    /// the WAL is damaged.
    pub fn catch_up(&self) -> Result<u64> {
        let start_offset = self.offset_file.load()?;
        let mut tailer = match WalTailer::open(&self.wal_path, start_offset) {
            Ok(tailer) => tailer,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no WAL at {}; nothing to index", self.wal_path.display());
                return Ok(0);
            }
            Err(e) => return Err(e),
        };
        let started = Instant::now();

        let mut total = 0u64;
        loop {
            let drained = self.index_batch(&mut tailer)?;
            if drained == 0 {
                break;
            }
            total += drained;
        }

        let wal_len = fs::metadata(&self.wal_path)?.len();
        if wal_len > tailer.position() {
            warn!(
                "discarding {} bytes of partial WAL tail at offset {}",
                wal_len - tailer.position(),
                tailer.position()
            );
            fs::OpenOptions::new()
                .write(true)
                .open(&self.wal_path)?
                .set_len(tailer.position())?;
        }

        info!(
            "startup indexing: {} records, WAL offset {} -> {} in {:?}",
            total,
            start_offset,
            tailer.position(),
            started.elapsed()
        );
        Ok(total)
    }

    /// Worker loop: poll, drain, sleep on an idle WAL
    pub fn run(&self, token: CancellationToken) {
        let mut tailer = match self.reopen_tailer() {
            Ok(tailer) => tailer,
            Err(e) => {
                error!("indexer failed to open the WAL: {}", e);
                return;
            }
        };
        info!("indexer running from WAL offset {}", tailer.position());

        while !token.is_cancelled() {
            match self.index_batch(&mut tailer) {
                Ok(0) => {
                    token.sleep_for(self.poll_interval);
                }
                Ok(_) => {}
                Err(Error::Corruption(msg)) => {
                    error!("indexer halting on a corrupt WAL record: {}", msg);
                    return;
                }
                Err(e) => {
                    warn!(
                        "indexing batch failed ({}); retrying from the last durable offset",
                        e
                    );
                    token.sleep_for(self.poll_interval);
                    match self.reopen_tailer() {
                        Ok(reopened) => tailer = reopened,
                        Err(e) => {
                            error!("indexer cannot reopen the WAL: {}", e);
                            return;
                        }
                    }
                }
            }
        }

        // Drain whatever the WAL still holds so shutdown leaves the
        // indexed log caught up and durable.
        loop {
            match self.index_batch(&mut tailer) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("final indexing drain failed: {}", e);
                    break;
                }
            }
        }
        if let Err(e) = self.sink.sync() {
            warn!("final indexed-log sync failed: {}", e);
        }
        info!("indexer stopped at WAL offset {}", tailer.position());
    }

    /// Stages up to [`MAX_BATCH`] records and drains them
    ///
    /// Returns the number of records applied; 0 means the WAL had
    /// nothing complete to read.
    fn index_batch(&self, tailer: &mut WalTailer) -> Result<u64> {
        let started = Instant::now();

        let mut staged: VecDeque<WalFrame> = VecDeque::new();
        while staged.len() < MAX_BATCH {
            match tailer.read_frame()? {
                Some((frame, _)) => staged.push_back(frame),
                None => break,
            }
        }
        if staged.is_empty() {
            return Ok(0);
        }

        let mut saw_checkpoint_end = false;
        for frame in &staged {
            if self.sink.apply(frame)? {
                saw_checkpoint_end = true;
            }
        }

        // Sync before advancing the offset: the crash-safety ordering.
        self.sink.sync()?;
        let position = tailer.position();
        self.offset_file.store(position)?;
        if let Some(replica_offset) = &self.replica_offset_file {
            replica_offset.store(position)?;
        }

        let count = staged.len() as u64;
        self.metrics.record_indexed_batch(count);
        self.telemetry.publish_indexing(IndexingReport {
            records: count,
            wal_offset: position,
            duration: started.elapsed(),
        });

        if saw_checkpoint_end {
            self.compact_after_checkpoint();
        }
        Ok(count)
    }

    fn compact_after_checkpoint(&self) {
        match self.sink.compact() {
            Ok(reclaimed) => {
                self.metrics.record_compaction();
                debug!(
                    "indexed log compacted after checkpoint: {} bytes reclaimed",
                    reclaimed
                );
            }
            Err(e) => warn!("indexed-log compaction failed: {}", e),
        }
    }

    fn reopen_tailer(&self) -> Result<WalTailer> {
        WalTailer::open(&self.wal_path, self.offset_file.load()?)
    }

    /// The indexed-offset currently on disk
    pub fn indexed_offset(&self) -> Result<WalOffset> {
        self.offset_file.load()
    }
}

/// Synchronous indexer: the WAL writer's append hook
///
/// Applies the same table per record, atomically, before the client's
/// write returns. Batching and sleeping are absent by construction.
pub struct SyncIndexer {
    sink: IndexSink,
    offset_file: OffsetFile,
    replica_offset_file: Option<OffsetFile>,
    metrics: Arc<RecoveryMetrics>,
}

impl SyncIndexer {
    pub fn new(config: &Config, logs: &PreparedLogs, metrics: Arc<RecoveryMetrics>) -> Self {
        Self {
            sink: IndexSink {
                log: Arc::clone(&logs.primary),
                replica: logs.replica.as_ref().map(Arc::clone),
            },
            offset_file: OffsetFile::new(config.indexed_offset_path()),
            replica_offset_file: logs
                .replica
                .as_ref()
                .and(config.replica_offset_path())
                .map(OffsetFile::new),
            metrics,
        }
    }
}

impl AppendObserver for SyncIndexer {
    fn frame_appended(&self, frame: &WalFrame, start: WalOffset, encoded: &[u8]) -> Result<()> {
        let saw_checkpoint_end = self.sink.apply(frame)?;
        self.sink.sync()?;

        let end = start + encoded.len() as u64;
        self.offset_file.store(end)?;
        if let Some(replica_offset) = &self.replica_offset_file {
            replica_offset.store(end)?;
        }
        self.metrics.record_indexed_batch(1);

        if saw_checkpoint_end {
            match self.sink.compact() {
                Ok(_) => self.metrics.record_compaction(),
                Err(e) => warn!("indexed-log compaction failed: {}", e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use phoenixdb_core::SyncMode;
    use phoenixdb_storage::wal::WalWriter;

    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        Config {
            indexed_log_path: dir.path().join("indexed.db"),
            wal_path: dir.path().join("wal.aof"),
            ..Config::default()
        }
    }

    fn indexer_for(config: &Config, logs: &PreparedLogs) -> Indexer {
        Indexer::new(
            config,
            logs,
            Arc::new(RecoveryMetrics::new()),
            Arc::new(TelemetryHub::new()),
        )
    }

    fn write_wal(config: &Config, frames: &[WalFrame]) {
        let writer = WalWriter::open(&config.wal_path, SyncMode::Full).unwrap();
        for frame in frames {
            writer.append(frame).unwrap();
        }
    }

    #[test]
    fn catch_up_applies_the_command_table() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_wal(
            &config,
            &[
                WalFrame::set(b"a", b"1"),
                WalFrame::incr(b"a"),
                WalFrame::set(b"b", b"x"),
                WalFrame::del(b"b"),
                WalFrame::set_ir(b"c", b"restored"),
                WalFrame::new(vec![b"EXPIRE".to_vec(), b"a".to_vec(), b"60".to_vec()]),
            ],
        );

        let logs = prepare_logs(&config).unwrap();
        let indexer = indexer_for(&config, &logs);
        let indexed = indexer.catch_up().unwrap();
        assert_eq!(indexed, 6);

        // "a": both frames, in WAL order.
        assert_eq!(
            logs.primary.lookup(b"a").unwrap(),
            vec![
                WalFrame::set(b"a", b"1").encode(),
                WalFrame::incr(b"a").encode(),
            ]
        );
        // "b" was deleted, "c" restored via SETIR.
        assert!(logs.primary.lookup(b"b").unwrap().is_empty());
        assert_eq!(
            logs.primary.lookup(b"c").unwrap(),
            vec![WalFrame::set_ir(b"c", b"restored").encode()]
        );

        // Offset file points at EOF.
        let wal_len = std::fs::metadata(&config.wal_path).unwrap().len();
        assert_eq!(indexer.indexed_offset().unwrap(), wal_len);
    }

    #[test]
    fn catch_up_resumes_from_the_stored_offset() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        // First epoch indexes one frame and records its offset.
        write_wal(&config, &[WalFrame::set(b"a", b"1")]);
        {
            let logs = prepare_logs(&config).unwrap();
            assert_eq!(indexer_for(&config, &logs).catch_up().unwrap(), 1);
            logs.primary.sync().unwrap();
        }

        // More WAL arrives while the engine is down.
        let writer = WalWriter::open(&config.wal_path, SyncMode::Full).unwrap();
        writer.append(&WalFrame::set(b"b", b"2")).unwrap();

        // Second epoch only indexes the new tail.
        let logs = prepare_logs(&config).unwrap();
        let indexed = indexer_for(&config, &logs).catch_up().unwrap();

        assert_eq!(indexed, 1);
        assert_eq!(logs.primary.lookup(b"a").unwrap().len(), 1);
        assert_eq!(logs.primary.lookup(b"b").unwrap().len(), 1);
    }

    #[test]
    fn stale_offset_reindexes_with_at_most_one_duplicate_per_record() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_wal(&config, &[WalFrame::set(b"k", b"v"), WalFrame::incr(b"k")]);

        // First epoch: index everything, but crash before the offset
        // write (simulated by resetting the offset file afterwards).
        {
            let logs = prepare_logs(&config).unwrap();
            indexer_for(&config, &logs).catch_up().unwrap();
        }
        OffsetFile::new(config.indexed_offset_path()).store(0).unwrap();

        // Second epoch re-applies the same batch.
        let logs = prepare_logs(&config).unwrap();
        indexer_for(&config, &logs).catch_up().unwrap();

        let chain = logs.primary.lookup(b"k").unwrap();
        assert_eq!(chain.len(), 4); // 2 originals + 1 duplicate each
        assert_eq!(chain[0], chain[2]);
        assert_eq!(chain[1], chain[3]);
    }

    #[test]
    fn setcheckpoint_collapses_history_and_checkpointend_compacts() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_wal(
            &config,
            &[
                WalFrame::set(b"k", b"v1"),
                WalFrame::incr(b"k"),
                WalFrame::incr(b"k"),
                WalFrame::set(b"k", b"v2"),
                WalFrame::set_checkpoint(b"k", b"v2"),
                WalFrame::checkpoint_end(1),
            ],
        );

        let logs = prepare_logs(&config).unwrap();
        let metrics = Arc::new(RecoveryMetrics::new());
        let indexer = Indexer::new(
            &config,
            &logs,
            Arc::clone(&metrics),
            Arc::new(TelemetryHub::new()),
        );
        indexer.catch_up().unwrap();

        let chain = logs.primary.lookup(b"k").unwrap();
        assert_eq!(chain, vec![WalFrame::set(b"k", b"v2").encode()]);
        assert_eq!(metrics.compactions(), 1);
    }

    #[test]
    fn replica_receives_the_same_stream() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.replicate_indexed_log = true;
        config.replica_path = Some(dir.path().join("replica.db"));

        write_wal(
            &config,
            &[WalFrame::set(b"a", b"1"), WalFrame::set(b"b", b"2")],
        );

        let logs = prepare_logs(&config).unwrap();
        indexer_for(&config, &logs).catch_up().unwrap();

        let replica = logs.replica.as_ref().unwrap();
        assert_eq!(replica.key_count(), 2);
        assert_eq!(
            replica.lookup(b"a").unwrap(),
            vec![WalFrame::set(b"a", b"1").encode()]
        );

        // The replica offset file advanced with the primary's.
        let replica_offset = OffsetFile::new(config.replica_offset_path().unwrap())
            .load()
            .unwrap();
        assert_eq!(
            replica_offset,
            std::fs::metadata(&config.wal_path).unwrap().len()
        );
    }

    #[test]
    fn missing_indexed_log_with_replica_present_promotes_the_replica() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.replicate_indexed_log = true;
        config.replica_path = Some(dir.path().join("replica.db"));
        write_wal(&config, &[WalFrame::set(b"a", b"1")]);

        // Build primary + replica, then lose the primary.
        {
            let logs = prepare_logs(&config).unwrap();
            indexer_for(&config, &logs).catch_up().unwrap();
        }
        fs::remove_file(&config.indexed_log_path).unwrap();
        OffsetFile::new(config.indexed_offset_path()).remove().unwrap();

        let logs = prepare_logs(&config).unwrap();
        // The replica was renamed into place and replication disabled.
        assert!(logs.replica.is_none());
        assert!(!dir.path().join("replica.db").exists());
        assert_eq!(
            logs.primary.lookup(b"a").unwrap(),
            vec![WalFrame::set(b"a", b"1").encode()]
        );

        // Its offset was adopted, so catch-up has nothing to redo.
        let indexed = indexer_for(&config, &logs).catch_up().unwrap();
        assert_eq!(indexed, 0);
    }

    #[test]
    fn both_missing_rebuilds_from_the_checkpoint_offset() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        let before = WalFrame::set(b"old", b"1");
        let after = WalFrame::set(b"new", b"2");
        write_wal(&config, &[before.clone(), after.clone()]);

        // A completed checkpoint recorded its start offset; everything
        // before it is covered by checkpoint records (not in this tiny
        // fixture, but the offset contract is what matters).
        OffsetFile::new(config.checkpoint_offset_path())
            .store(before.encoded_len() as u64)
            .unwrap();

        let logs = prepare_logs(&config).unwrap();
        indexer_for(&config, &logs).catch_up().unwrap();

        assert!(logs.primary.lookup(b"old").unwrap().is_empty());
        assert_eq!(logs.primary.lookup(b"new").unwrap(), vec![after.encode()]);
    }

    #[test]
    fn corrupt_indexed_log_falls_back_to_rebuild() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_wal(&config, &[WalFrame::set(b"a", b"1")]);

        // Leave behind a file that is not an indexed log.
        fs::write(&config.indexed_log_path, b"not an indexed log at all").unwrap();
        OffsetFile::new(config.indexed_offset_path()).store(999).unwrap();

        let logs = prepare_logs(&config).unwrap();
        // Rebuild reset the offset to the checkpoint offset (0 here).
        assert_eq!(
            OffsetFile::new(config.indexed_offset_path()).load().unwrap(),
            0
        );
        let indexed = indexer_for(&config, &logs).catch_up().unwrap();
        assert_eq!(indexed, 1);
        assert_eq!(logs.primary.key_count(), 1);
    }

    #[test]
    fn sync_indexer_indexes_before_append_returns() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_wal(&config, &[]); // create the WAL file

        let logs = prepare_logs(&config).unwrap();
        let sync_indexer = Arc::new(SyncIndexer::new(
            &config,
            &logs,
            Arc::new(RecoveryMetrics::new()),
        ));

        let writer = WalWriter::open(&config.wal_path, SyncMode::Full).unwrap();
        writer.set_observer(sync_indexer);

        let frame = WalFrame::set(b"k", b"v");
        writer.append(&frame).unwrap();

        // No background worker ran; the append itself indexed the key
        // and advanced the offset.
        assert_eq!(logs.primary.lookup(b"k").unwrap(), vec![frame.encode()]);
        assert_eq!(
            OffsetFile::new(config.indexed_offset_path()).load().unwrap(),
            frame.encoded_len() as u64
        );
    }
}
