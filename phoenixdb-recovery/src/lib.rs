//! Instant recovery for an in-memory key-value store
//!
//! Instead of blocking startup while the write-ahead log replays, the
//! engine becomes available immediately and reconstructs state while
//! serving traffic. Three mechanisms cooperate:
//!
//! - the [`indexer`] tails the WAL and maintains the indexed log, a
//!   per-key map of the records that redo each key
//! - the [`incremental`] restorer walks the indexed log in the
//!   background and replays every key into the live store
//! - the [`on_demand`] restorer reconstructs a single key inline when a
//!   command touches it before the background replay got there
//!
//! The [`checkpoint`] worker bounds recovery work by rewriting live
//! values into the WAL so the indexer can collapse per-key history.
//! [`engine::RecoveryEngine`] wires everything together and owns the
//! worker lifecycle.

pub mod access_counter;
pub mod checkpoint;
pub mod engine;
pub mod incremental;
pub mod indexer;
pub mod metrics;
pub mod on_demand;
pub mod ports;
pub mod replay;
pub mod restored_set;
pub mod store;
pub mod telemetry;
pub mod worker;

pub use engine::RecoveryEngine;
pub use metrics::RecoveryMetrics;
pub use store::MemoryStore;
