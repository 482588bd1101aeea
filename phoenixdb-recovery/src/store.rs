//! Live-store collaborator
//!
//! A deliberately small in-memory key-value store standing in for the
//! host database. It has the three properties the recovery engine
//! relies on:
//!
//! - every mutating command is WAL-logged before it is applied
//! - the dispatcher materializes a key (via the on-demand restorer)
//!   before any command touches it, so a client never observes a key
//!   that recovery has not caught up on
//! - the SET/INCR path feeds the MFU access counter
//!
//! It also implements both recovery ports: restorer `SETIR` submissions
//! and checkpointer `SETCHECKPOINT`/`CHECKPOINTEND` records flow through
//! the same WAL pipeline as client commands, which is what lets the
//! indexer observe them.

use crate::access_counter::AccessCounter;
use crate::on_demand::OnDemandRestorer;
use crate::ports::{CheckpointPort, RedoPort};
use crate::replay::textual_int;

use phoenixdb_core::{Key, Result, Value, WalOffset};
use phoenixdb_storage::wal::{WalFrame, WalWriter};

use parking_lot::RwLock;

use std::collections::HashMap;
use std::sync::Arc;

/// In-memory store with write-ahead logging
pub struct MemoryStore {
    data: RwLock<HashMap<Key, Value>>,
    wal: Arc<WalWriter>,
    access: Arc<AccessCounter>,
    recovery: RwLock<Option<Arc<OnDemandRestorer>>>,
}

impl MemoryStore {
    pub fn new(wal: Arc<WalWriter>, access: Arc<AccessCounter>) -> Arc<Self> {
        Arc::new(Self {
            data: RwLock::new(HashMap::new()),
            wal,
            access,
            recovery: RwLock::new(None),
        })
    }

    /// Wires the on-demand restorer into the command dispatch path
    pub fn attach_recovery(&self, restorer: Arc<OnDemandRestorer>) {
        *self.recovery.write() = Some(restorer);
    }

    /// Ensures `key` is materialized before a command proceeds
    fn materialize(&self, key: &[u8]) -> Result<()> {
        let restorer = self.recovery.read().clone();
        if let Some(restorer) = restorer {
            restorer.materialize(key)?;
        }
        Ok(())
    }

    /// `GET key`
    pub fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        self.materialize(key)?;
        Ok(self.data.read().get(key).cloned())
    }

    /// `SET key value`
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.materialize(key)?;
        self.wal.append(&WalFrame::set(key, value))?;
        self.access.record(key);
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    /// `INCR key`: treats the value as a textual integer, missing = 0
    pub fn incr(&self, key: &[u8]) -> Result<i64> {
        self.materialize(key)?;
        self.wal.append(&WalFrame::incr(key))?;
        self.access.record(key);

        let mut data = self.data.write();
        let base = data.get(key).map(|v| textual_int(v)).unwrap_or(0);
        let next = base + 1;
        data.insert(key.to_vec(), next.to_string().into_bytes());
        Ok(next)
    }

    /// `DEL key`; returns whether the key existed
    pub fn del(&self, key: &[u8]) -> Result<bool> {
        self.materialize(key)?;
        if !self.data.read().contains_key(key) {
            return Ok(false);
        }
        self.wal.append(&WalFrame::del(key))?;
        self.data.write().remove(key);
        Ok(true)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// The WAL this store logs to
    pub fn wal(&self) -> &Arc<WalWriter> {
        &self.wal
    }
}

impl RedoPort for MemoryStore {
    fn submit_set_ir(&self, key: &[u8], value: &[u8]) -> Result<()> {
        // The restorer is the caller here; materializing would recurse.
        self.wal.append(&WalFrame::set_ir(key, value))?;
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

impl CheckpointPort for MemoryStore {
    fn live_keys(&self) -> Vec<Key> {
        self.data.read().keys().cloned().collect()
    }

    fn value_of(&self, key: &[u8]) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    fn submit_checkpoint_set(&self, key: &[u8], value: &[u8]) -> Result<WalOffset> {
        self.wal.append(&WalFrame::set_checkpoint(key, value))
    }

    fn submit_checkpoint_end(&self, id: u64) -> Result<WalOffset> {
        self.wal.append(&WalFrame::checkpoint_end(id))
    }

    fn wal_end_offset(&self) -> WalOffset {
        self.wal.end_offset()
    }
}
