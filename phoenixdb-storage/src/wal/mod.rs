//! Write-Ahead Log: framed command stream
//!
//! The WAL is a single append-only file holding every mutating command
//! the store executes, in execution order. It is the authoritative
//! durable history; the indexed log and all recovery state are derived
//! from it.
//!
//! ## Record Format
//!
//! Each record is a length-prefixed array of length-prefixed bulk
//! strings, newline-terminated:
//!
//! ```text
//! *<argc>\n
//! $<len1>\n<arg1>\n
//! $<len2>\n<arg2>\n
//! ...
//! ```
//!
//! The first argument is the command name. Commands meaningful to the
//! recovery subsystem:
//!
//! | Command | Meaning |
//! |---|---|
//! | `SET K V` | store V under K |
//! | `INCR K` | increment K's textual integer value |
//! | `DEL K` | remove K |
//! | `SETCHECKPOINT K V` | checkpoint rewrite of K's live value |
//! | `CHECKPOINTEND id` | marker closing a checkpoint round |
//! | `SETIR K V` | SET issued by a restorer (same semantics, WAL-logged) |
//!
//! Anything else in the stream is ignored by the indexer.
//!
//! ## Offsets
//!
//! Positions in the WAL are absolute byte offsets into this stream. A
//! record is fully durable or absent: the tail of the file may hold a
//! partially flushed record after a crash, and readers treat such a
//! partial frame as end-of-data rather than corruption.
//!
//! ## Durability
//!
//! [`WalWriter`] applies a configurable [`SyncMode`](phoenixdb_core::SyncMode)
//! per append. The writer also carries an [`AppendObserver`] hook: when
//! installed, the observer runs after the record reaches the file and
//! before the append returns, which is how synchronous indexing ties the
//! indexed log to the client write path.

mod frame;
mod tailer;
mod writer;

pub use frame::{FrameParse, WalCommand, WalFrame, MAX_ARGS, MAX_ARG_LEN};
pub use tailer::WalTailer;
pub use writer::{AppendObserver, WalWriter};
