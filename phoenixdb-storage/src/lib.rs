//! Durable substrate for the PhoenixDB instant-recovery engine
//!
//! This crate owns the three on-disk artifacts the recovery engine works
//! with:
//!
//! - the **write-ahead log** ([`wal`]): an append-only stream of framed
//!   commands, written by the store and tailed by the indexer
//! - the **indexed log** ([`indexed_log`]): a per-key index over the WAL,
//!   mapping each database key to the sequence of log records that redo it
//! - the **offset files** ([`meta`]): 8-byte metadata files recording the
//!   WAL positions up to which the indexed log and the last checkpoint are
//!   durable

pub mod indexed_log;
pub mod meta;
pub mod wal;
