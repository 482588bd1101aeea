//! Interfaces to the live store
//!
//! The recovery engine never touches the store's data structures
//! directly; it crosses the boundary through two narrow ports. Both are
//! implemented by [`MemoryStore`](crate::store::MemoryStore), and both
//! route through the store's normal command pipeline — in particular
//! every submission is WAL-logged, so the indexer observes restored and
//! checkpointed writes exactly as it observes client writes.

use phoenixdb_core::{Key, Result, Value, WalOffset};

/// Redo-command submission, used by the restorers
pub trait RedoPort: Send + Sync {
    /// Applies `SETIR key value`: SET semantics, WAL-logged, without
    /// re-triggering materialization
    fn submit_set_ir(&self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// Key enumeration and checkpoint-record submission, used by the
/// checkpointer
pub trait CheckpointPort: Send + Sync {
    /// Snapshot of every live key
    fn live_keys(&self) -> Vec<Key>;

    /// Current live value of `key`, if any
    fn value_of(&self, key: &[u8]) -> Option<Value>;

    /// Emits `SETCHECKPOINT key value` through the WAL path
    fn submit_checkpoint_set(&self, key: &[u8], value: &[u8]) -> Result<WalOffset>;

    /// Emits the `CHECKPOINTEND id` marker
    fn submit_checkpoint_end(&self, id: u64) -> Result<WalOffset>;

    /// Offset one past the last WAL byte, captured at round start
    fn wal_end_offset(&self) -> WalOffset;
}
