//! Restored-key set
//!
//! The single source of truth for "has this key been materialized in
//! the live store since restart". Both restore paths consult it; its
//! membership only grows within an epoch.
//!
//! Loading a key is a two-step claim/complete protocol rather than a
//! bare insert. A claim marks the key in flight so exactly one loader
//! reconstructs it; `complete` promotes it to restored. The on-demand
//! path blocks on a concurrent loader (its caller must observe the key
//! live before proceeding), while the incremental scan just skips keys
//! it cannot claim.

use phoenixdb_core::Key;

use parking_lot::{Condvar, Mutex};

use std::collections::HashSet;

/// Result of [`RestoredSet::claim`]
#[derive(Debug, PartialEq, Eq)]
pub enum Claim {
    /// The caller now owns loading this key and must call `complete`
    Claimed,
    /// The key is already live (possibly loaded by a concurrent claimer
    /// the call waited on)
    AlreadyRestored,
}

#[derive(Default)]
struct State {
    restored: HashSet<Key>,
    in_flight: HashSet<Key>,
}

/// Concurrent set of keys materialized since restart
#[derive(Default)]
pub struct RestoredSet {
    state: Mutex<State>,
    cond: Condvar,
}

impl RestoredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` for loading, waiting out a concurrent loader
    ///
    /// Returns [`Claim::AlreadyRestored`] once the key is live — either
    /// it already was, or another thread held the claim and this call
    /// blocked until that load completed.
    pub fn claim(&self, key: &[u8]) -> Claim {
        let mut state = self.state.lock();
        loop {
            if state.restored.contains(key) {
                return Claim::AlreadyRestored;
            }
            if !state.in_flight.contains(key) {
                state.in_flight.insert(key.to_vec());
                return Claim::Claimed;
            }
            self.cond.wait(&mut state);
        }
    }

    /// Claims `key` without blocking
    ///
    /// Returns `false` when the key is restored or another loader holds
    /// the claim; the incremental scan treats both as "skip".
    pub fn try_claim(&self, key: &[u8]) -> bool {
        let mut state = self.state.lock();
        if state.restored.contains(key) || state.in_flight.contains(key) {
            return false;
        }
        state.in_flight.insert(key.to_vec());
        true
    }

    /// Promotes a claimed key to restored and wakes waiters
    pub fn complete(&self, key: &[u8]) {
        let mut state = self.state.lock();
        state.in_flight.remove(key);
        state.restored.insert(key.to_vec());
        self.cond.notify_all();
    }

    /// Whether `key` is fully restored
    pub fn contains(&self, key: &[u8]) -> bool {
        self.state.lock().restored.contains(key)
    }

    /// Number of restored keys
    pub fn len(&self) -> usize {
        self.state.lock().restored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
