//! Round-trip laws: state written before a restart is visible after it

use phoenixdb_core::{Config, SyncMode};
use phoenixdb_recovery::ports::CheckpointPort;
use phoenixdb_recovery::RecoveryEngine;
use phoenixdb_storage::wal::{WalFrame, WalWriter};

use tempfile::TempDir;

use std::io::Write;
use std::time::Duration;

fn test_config(dir: &TempDir) -> Config {
    let _ = env_logger::builder().is_test(true).try_init();
    Config {
        wal_path: dir.path().join("wal.aof"),
        indexed_log_path: dir.path().join("indexed.db"),
        indexer_poll_interval: Duration::from_micros(2_000),
        ..Config::default()
    }
}

/// Tests the most basic durability law: a SET survives a restart.
///
/// After a clean shutdown and restart the key is not in memory yet;
/// reading it exercises the materialize-before-access path.
#[test]
fn set_then_restart_returns_the_value() {
    let dir = TempDir::new().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    engine.store().set(b"k", b"v").unwrap();
    engine.shutdown().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    assert_eq!(engine.store().get(b"k").unwrap(), Some(b"v".to_vec()));
    engine.shutdown().unwrap();
}

/// Tests that the newest SET wins across a restart.
#[test]
fn two_sets_then_restart_returns_the_second_value() {
    let dir = TempDir::new().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    engine.store().set(b"k", b"v1").unwrap();
    engine.store().set(b"k", b"v2").unwrap();
    engine.shutdown().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    assert_eq!(engine.store().get(b"k").unwrap(), Some(b"v2".to_vec()));
    engine.shutdown().unwrap();
}

/// Tests that INCR history replays on top of the last SET.
#[test]
fn set_zero_and_two_incrs_restart_to_two() {
    let dir = TempDir::new().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    engine.store().set(b"n", b"0").unwrap();
    engine.store().incr(b"n").unwrap();
    engine.store().incr(b"n").unwrap();
    engine.shutdown().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    assert_eq!(engine.store().get(b"n").unwrap(), Some(b"2".to_vec()));
    engine.shutdown().unwrap();
}

/// Tests that a deleted key stays deleted across a restart.
#[test]
fn set_then_del_restarts_to_a_miss() {
    let dir = TempDir::new().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    engine.store().set(b"k", b"v").unwrap();
    engine.store().del(b"k").unwrap();
    engine.shutdown().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    assert_eq!(engine.store().get(b"k").unwrap(), None);
    engine.shutdown().unwrap();
}

/// Tests that a DEL after a checkpoint rewrite still wins.
///
/// The checkpoint record collapses the key's history, but the DEL is
/// later in WAL order and removes the collapsed chain too.
#[test]
fn checkpoint_rewrite_then_del_restarts_to_a_miss() {
    let dir = TempDir::new().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    engine.store().set(b"k", b"v").unwrap();
    engine.store().submit_checkpoint_set(b"k", b"v2").unwrap();
    engine.store().del(b"k").unwrap();
    engine.shutdown().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    assert_eq!(engine.store().get(b"k").unwrap(), None);
    engine.shutdown().unwrap();
}

/// Tests startup over a directory with no WAL at all.
#[test]
fn empty_wal_starts_an_empty_store() {
    let dir = TempDir::new().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    assert_eq!(engine.store().get(b"anything").unwrap(), None);
    assert!(engine.store().is_empty());
    engine.shutdown().unwrap();
}

/// Tests a mixed workload surviving a restart key for key.
#[test]
fn mixed_workload_state_is_identical_after_restart() {
    let dir = TempDir::new().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    let store = engine.store();
    for i in 0..50u32 {
        store
            .set(format!("key{}", i).as_bytes(), format!("v{}", i).as_bytes())
            .unwrap();
    }
    for i in 0..50u32 {
        if i % 3 == 0 {
            store.del(format!("key{}", i).as_bytes()).unwrap();
        }
        if i % 5 == 0 {
            store.incr(format!("ctr{}", i).as_bytes()).unwrap();
        }
    }
    engine.shutdown().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    let store = engine.store();
    for i in 0..50u32 {
        let key = format!("key{}", i);
        let expected = if i % 3 == 0 {
            None
        } else {
            Some(format!("v{}", i).into_bytes())
        };
        assert_eq!(store.get(key.as_bytes()).unwrap(), expected, "{}", key);
    }
    for i in (0..50u32).step_by(5) {
        let key = format!("ctr{}", i);
        assert_eq!(store.get(key.as_bytes()).unwrap(), Some(b"1".to_vec()));
    }
    engine.shutdown().unwrap();
}

/// Tests recovery across an unclean shutdown that tore the last WAL
/// record.
///
/// The partial tail is discarded at startup and this epoch's appends
/// continue from the clean boundary.
#[test]
fn partial_trailing_frame_is_discarded_and_writes_continue() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    // A previous epoch wrote two full frames and crashed mid-third.
    {
        let wal = WalWriter::open(&config.wal_path, SyncMode::Full).unwrap();
        wal.append(&WalFrame::set(b"a", b"1")).unwrap();
        wal.append(&WalFrame::set(b"b", b"2")).unwrap();
    }
    {
        let torn = WalFrame::set(b"c", b"3").encode();
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&config.wal_path)
            .unwrap();
        file.write_all(&torn[..torn.len() - 4]).unwrap();
    }

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    assert_eq!(engine.store().get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.store().get(b"b").unwrap(), Some(b"2".to_vec()));
    // The torn record is gone, not half-applied.
    assert_eq!(engine.store().get(b"c").unwrap(), None);

    engine.store().set(b"c", b"3").unwrap();
    engine.shutdown().unwrap();

    let engine = RecoveryEngine::start(test_config(&dir)).unwrap();
    assert_eq!(engine.store().get(b"c").unwrap(), Some(b"3".to_vec()));
    engine.shutdown().unwrap();
}

/// Tests that disabling the subsystem leaves a plain WAL-logging store.
#[test]
fn instant_recovery_off_serves_an_empty_store_without_workers() {
    let dir = TempDir::new().unwrap();

    // A WAL from an earlier epoch exists but is ignored.
    {
        let config = test_config(&dir);
        let wal = WalWriter::open(&config.wal_path, SyncMode::Full).unwrap();
        wal.append(&WalFrame::set(b"old", b"v")).unwrap();
    }

    let config = Config {
        instant_recovery: false,
        ..test_config(&dir)
    };
    let engine = RecoveryEngine::start(config).unwrap();
    assert!(engine.indexed_log().is_none());
    assert_eq!(engine.store().get(b"old").unwrap(), None);

    engine.store().set(b"new", b"v").unwrap();
    assert_eq!(engine.store().get(b"new").unwrap(), Some(b"v".to_vec()));
    engine.shutdown().unwrap();
}

/// Tests that a clean shutdown leaves the re-exec timestamp behind.
#[test]
fn clean_shutdown_writes_the_shutdown_stamp() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let stamp_path = config.shutdown_stamp_path();

    let engine = RecoveryEngine::start(config).unwrap();
    assert!(!stamp_path.exists());
    engine.shutdown().unwrap();

    let stamp = std::fs::read(&stamp_path).unwrap();
    assert_eq!(stamp.len(), 8);
    assert!(u64::from_le_bytes(stamp.try_into().unwrap()) > 0);
}
