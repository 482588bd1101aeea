//! Startup configuration
//!
//! The engine is configured from a flat text file of `key value` lines,
//! the same surface the host store exposes to operators. Parsing turns
//! every stringly option (`ON`/`OFF`, `BTREE`/`HASH`, `B`/`A`) into a
//! tagged enum here; the rest of the system never sees the raw strings.
//!
//! Unknown keys are ignored (the file is shared with the host store),
//! invalid values fail startup, and contradictory combinations are
//! rejected by [`Config::validate`].

use crate::{Error, Result};

use log::warn;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Storage structure backing the indexed log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStructure {
    /// Ordered tree: key-ordered scans, duplicates in insertion order
    Btree,
    /// Hash table: O(1) point lookups, arbitrary scan order
    Hash,
}

/// Whether the indexer worker starts before or after the incremental
/// restorer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerStart {
    BeforeRestore,
    AfterRestore,
}

/// Typed view of the recovery-related configuration keys
#[derive(Debug, Clone)]
pub struct Config {
    /// Master switch for the whole instant-recovery subsystem
    pub instant_recovery: bool,
    /// Synchronous (inline, per-record) vs asynchronous (background)
    /// indexing
    pub synchronous_indexing: bool,
    /// Storage structure for the indexed log
    pub indexed_log_structure: LogStructure,
    /// Indexed log file location
    pub indexed_log_path: PathBuf,
    /// Write-ahead log file location
    pub wal_path: PathBuf,
    /// How long the indexer sleeps when the WAL has no new records
    pub indexer_poll_interval: Duration,
    /// Indexer start order relative to the incremental restorer
    pub indexer_start: IndexerStart,
    /// Mirror indexed-log writes into a replica file
    pub replicate_indexed_log: bool,
    /// Replica file location (required when replication is on)
    pub replica_path: Option<PathBuf>,
    /// Discard the indexed log at startup and rebuild from the last
    /// checkpoint offset
    pub rebuild_indexed_log: bool,
    /// Enable the checkpointer worker
    pub checkpoints_enabled: bool,
    /// Checkpoint only the most-frequently-used keys
    pub checkpoints_only_mfu: bool,
    /// Delay before the first checkpoint round
    pub first_checkpoint_delay: Duration,
    /// Interval between checkpoint rounds
    pub checkpoint_interval: Duration,
    /// Number of rounds to run; 0 means unbounded
    pub checkpoint_rounds: u32,
    /// Derive the next interval from the last round's duration
    pub selftune_checkpoint_interval: bool,
    /// Stop the checkpointer when the external benchmark driver finishes
    pub stop_checkpoint_after_benchmark: bool,
    /// Keys to preload before a harness-driven restart; 0 disables
    pub preload_and_restart: u64,
    /// Restart the process when the external benchmark driver finishes
    pub restart_after_benchmark: bool,
    /// Shut the engine down after this long (benchmark-driven runs)
    pub stop_after: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instant_recovery: true,
            synchronous_indexing: false,
            indexed_log_structure: LogStructure::Btree,
            indexed_log_path: PathBuf::from("indexedlog.db"),
            wal_path: PathBuf::from("appendonly.aof"),
            indexer_poll_interval: Duration::from_micros(100_000),
            indexer_start: IndexerStart::BeforeRestore,
            replicate_indexed_log: false,
            replica_path: None,
            rebuild_indexed_log: false,
            checkpoints_enabled: false,
            checkpoints_only_mfu: false,
            first_checkpoint_delay: Duration::from_secs(60),
            checkpoint_interval: Duration::from_secs(300),
            checkpoint_rounds: 0,
            selftune_checkpoint_interval: false,
            stop_checkpoint_after_benchmark: false,
            preload_and_restart: 0,
            restart_after_benchmark: false,
            stop_after: None,
        }
    }
}

impl Config {
    /// Loads and validates configuration from a text file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::parse(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from the raw file contents
    ///
    /// Lines are `key value` pairs; blank lines and `#` comments are
    /// skipped. Unknown keys are ignored with a warning so the file can
    /// be shared with the host store's own options.
    pub fn parse(text: &str) -> Result<Self> {
        let mut config = Self::default();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or_default();
            let value = parts.next().map(str::trim).unwrap_or_default();
            if value.is_empty() {
                return Err(Error::Config(format!(
                    "line {}: option '{}' has no value",
                    lineno + 1,
                    key
                )));
            }

            match key {
                "instant_recovery_state" => {
                    config.instant_recovery = parse_on_off(key, value)?
                }
                "instant_recovery_synchronous" => {
                    config.synchronous_indexing = parse_on_off(key, value)?
                }
                "indexedlog_structure" => {
                    config.indexed_log_structure = match value {
                        "BTREE" => LogStructure::Btree,
                        "HASH" => LogStructure::Hash,
                        other => {
                            return Err(Error::Config(format!(
                                "invalid value '{}' for {} (expected BTREE or HASH)",
                                other, key
                            )))
                        }
                    }
                }
                "indexedlog_filename" => config.indexed_log_path = PathBuf::from(value),
                "aof_filename" => config.wal_path = PathBuf::from(value),
                "indexer_time_interval" => {
                    config.indexer_poll_interval =
                        Duration::from_micros(parse_number(key, value)?)
                }
                "starts_log_indexing" => {
                    config.indexer_start = match value {
                        "B" => IndexerStart::BeforeRestore,
                        "A" => IndexerStart::AfterRestore,
                        other => {
                            return Err(Error::Config(format!(
                                "invalid value '{}' for {} (expected B or A)",
                                other, key
                            )))
                        }
                    }
                }
                "indexedlog_replicated" => {
                    config.replicate_indexed_log = parse_on_off(key, value)?
                }
                "indexedlog_replicated_filename" => {
                    config.replica_path = Some(PathBuf::from(value))
                }
                "rebuild_indexedlog" => config.rebuild_indexed_log = parse_on_off(key, value)?,
                "checkpoint_state" => config.checkpoints_enabled = parse_on_off(key, value)?,
                "checkpoints_only_mfu" => {
                    config.checkpoints_only_mfu = parse_on_off(key, value)?
                }
                "first_checkpoint_start_time" => {
                    config.first_checkpoint_delay =
                        Duration::from_secs(parse_number(key, value)?)
                }
                "checkpoint_time_interval" => {
                    config.checkpoint_interval = Duration::from_secs(parse_number(key, value)?)
                }
                "number_checkpoints" => {
                    config.checkpoint_rounds = parse_number(key, value)? as u32
                }
                "selftune_checkpoint_time_interval" => {
                    config.selftune_checkpoint_interval = parse_on_off(key, value)?
                }
                "stop_checkpoint_after_benchmark" => {
                    config.stop_checkpoint_after_benchmark = parse_on_off(key, value)?
                }
                "preload_database_and_restart" => {
                    config.preload_and_restart = parse_number(key, value)?
                }
                "restart_after_benchmark" => {
                    config.restart_after_benchmark = parse_on_off(key, value)?
                }
                "stop_database_after_time" => {
                    let secs = parse_number(key, value)?;
                    config.stop_after = (secs > 0).then(|| Duration::from_secs(secs));
                }
                _ => warn!("ignoring unknown configuration key '{}'", key),
            }
        }

        Ok(config)
    }

    /// Rejects contradictory or incomplete option combinations
    pub fn validate(&self) -> Result<()> {
        if self.preload_and_restart > 0
            && (self.restart_after_benchmark
                || self.stop_checkpoint_after_benchmark
                || self.stop_after.is_some())
        {
            return Err(Error::Config(
                "preload_database_and_restart cannot be combined with \
                 benchmark-driven restart or stop-after options"
                    .to_string(),
            ));
        }

        if self.replicate_indexed_log && self.replica_path.is_none() {
            return Err(Error::Config(
                "indexedlog_replicated is ON but indexedlog_replicated_filename is not set"
                    .to_string(),
            ));
        }

        if self.checkpoints_enabled && self.checkpoint_interval.is_zero() {
            return Err(Error::Config(
                "checkpoint_time_interval must be positive when checkpoint_state is ON"
                    .to_string(),
            ));
        }

        if self.indexer_poll_interval.is_zero() {
            return Err(Error::Config(
                "indexer_time_interval must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the indexed-offset metadata file
    pub fn indexed_offset_path(&self) -> PathBuf {
        append_extension(&self.indexed_log_path, "offset")
    }

    /// Path of the replica-indexed-offset metadata file
    pub fn replica_offset_path(&self) -> Option<PathBuf> {
        self.replica_path
            .as_ref()
            .map(|p| append_extension(p, "offset"))
    }

    /// Path of the checkpoint-offset metadata file
    pub fn checkpoint_offset_path(&self) -> PathBuf {
        append_extension(&self.wal_path, "checkpoint-offset")
    }

    /// Path of the shutdown timestamp stamp file
    pub fn shutdown_stamp_path(&self) -> PathBuf {
        append_extension(&self.wal_path, "shutdown-stamp")
    }
}

fn parse_on_off(key: &str, value: &str) -> Result<bool> {
    match value {
        "ON" => Ok(true),
        "OFF" => Ok(false),
        other => Err(Error::Config(format!(
            "invalid value '{}' for {} (expected ON or OFF)",
            other, key
        ))),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| {
        Error::Config(format!(
            "invalid value '{}' for {} (expected a non-negative integer)",
            value, key
        ))
    })
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_recognized_keys_into_typed_fields() {
        let text = "\
# recovery options
instant_recovery_state ON
instant_recovery_synchronous OFF
indexedlog_structure HASH
indexedlog_filename logs/indexed.db
aof_filename logs/appendonly.aof
indexer_time_interval 5000
starts_log_indexing A
checkpoint_state ON
checkpoints_only_mfu ON
first_checkpoint_start_time 10
checkpoint_time_interval 120
number_checkpoints 4
selftune_checkpoint_time_interval ON
";
        let config = Config::parse(text).unwrap();

        assert!(config.instant_recovery);
        assert!(!config.synchronous_indexing);
        assert_eq!(config.indexed_log_structure, LogStructure::Hash);
        assert_eq!(config.indexed_log_path, PathBuf::from("logs/indexed.db"));
        assert_eq!(config.wal_path, PathBuf::from("logs/appendonly.aof"));
        assert_eq!(config.indexer_poll_interval, Duration::from_micros(5000));
        assert_eq!(config.indexer_start, IndexerStart::AfterRestore);
        assert!(config.checkpoints_enabled);
        assert!(config.checkpoints_only_mfu);
        assert_eq!(config.first_checkpoint_delay, Duration::from_secs(10));
        assert_eq!(config.checkpoint_interval, Duration::from_secs(120));
        assert_eq!(config.checkpoint_rounds, 4);
        assert!(config.selftune_checkpoint_interval);
    }

    #[test]
    fn parse_ignores_unknown_keys() {
        let config = Config::parse("maxmemory 2gb\nsave 900 1\n").unwrap();
        assert!(config.instant_recovery);
    }

    #[test]
    fn parse_rejects_invalid_enum_values() {
        assert!(Config::parse("instant_recovery_state MAYBE\n").is_err());
        assert!(Config::parse("indexedlog_structure RBTREE\n").is_err());
        assert!(Config::parse("starts_log_indexing C\n").is_err());
        assert!(Config::parse("indexer_time_interval soon\n").is_err());
    }

    #[test]
    fn parse_rejects_missing_values() {
        assert!(Config::parse("checkpoint_state\n").is_err());
    }

    #[test]
    fn validate_rejects_preload_with_benchmark_driven_options() {
        let mut config = Config {
            preload_and_restart: 1000,
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        config.stop_after = Some(Duration::from_secs(30));
        assert!(config.validate().is_err());

        config.stop_after = None;
        config.restart_after_benchmark = true;
        assert!(config.validate().is_err());

        config.restart_after_benchmark = false;
        config.stop_checkpoint_after_benchmark = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_replica_filename_when_replicated() {
        let config = Config {
            replicate_indexed_log: true,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            replicate_indexed_log: true,
            replica_path: Some(PathBuf::from("replica.db")),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn offset_paths_derive_from_data_file_paths() {
        let config = Config::default();
        assert_eq!(
            config.indexed_offset_path(),
            PathBuf::from("indexedlog.db.offset")
        );
        assert_eq!(
            config.checkpoint_offset_path(),
            PathBuf::from("appendonly.aof.checkpoint-offset")
        );
        assert!(config.replica_offset_path().is_none());
    }

    #[test]
    fn load_reads_config_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("phoenix.conf");
        fs::write(&path, "indexedlog_structure BTREE\nnumber_checkpoints 2\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.indexed_log_structure, LogStructure::Btree);
        assert_eq!(config.checkpoint_rounds, 2);
    }
}
