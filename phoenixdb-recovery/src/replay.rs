//! Chain replay rules
//!
//! Reconstructs a key's final value from its indexed-log chain. The
//! chain holds WAL frames in WAL order; replay folds them into a single
//! value:
//!
//! - the value starts as `"0"`
//! - any flavor of SET (`SET`, `SETIR`, the synthetic SET a checkpoint
//!   collapse leaves behind) replaces the value
//! - `INCR` parses the current value as a textual integer and adds one
//!
//! Integer parsing is deliberately `atoi`-like: leading whitespace and
//! an optional sign are accepted, parsing stops at the first non-digit,
//! and a value with no digit prefix counts as 0. So incrementing the
//! value `"abc"` yields `"1"`. That quirk is observable behavior the
//! host store shares, not an accident.

use phoenixdb_core::{Error, Result, Value};
use phoenixdb_storage::wal::{FrameParse, WalCommand, WalFrame};

/// Folds a duplicate chain of encoded frames into the final value
pub fn replay_chain(chain: &[Value]) -> Result<Value> {
    let mut value: Value = b"0".to_vec();

    for bytes in chain {
        let frame = match WalFrame::parse(bytes)? {
            FrameParse::Complete { frame, .. } => frame,
            FrameParse::Incomplete => {
                return Err(Error::Corruption(
                    "truncated frame stored in indexed-log chain".to_string(),
                ))
            }
        };

        match frame.command() {
            WalCommand::Set { value: v, .. }
            | WalCommand::SetIr { value: v, .. }
            | WalCommand::SetCheckpoint { value: v, .. } => value = v.to_vec(),
            WalCommand::Incr { .. } => {
                value = (textual_int(&value) + 1).to_string().into_bytes()
            }
            // Deletes drop the whole chain at indexing time and markers
            // carry no data, so neither belongs in a chain.
            WalCommand::Del { .. } | WalCommand::CheckpointEnd { .. } | WalCommand::Other => {}
        }
    }

    Ok(value)
}

/// `atoi`-style parse: optional whitespace, optional sign, digit prefix
///
/// A byte string with no digit prefix parses as 0.
pub fn textual_int(bytes: &[u8]) -> i64 {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }

    let mut negative = false;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        negative = bytes[i] == b'-';
        i += 1;
    }

    let mut n: i64 = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        n = n
            .saturating_mul(10)
            .saturating_add((bytes[i] - b'0') as i64);
        i += 1;
    }

    if negative {
        -n
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(frames: &[WalFrame]) -> Vec<Value> {
        frames.iter().map(|f| f.encode()).collect()
    }

    #[test]
    fn last_set_wins() {
        let value = replay_chain(&chain(&[
            WalFrame::set(b"k", b"v1"),
            WalFrame::set(b"k", b"v2"),
        ]))
        .unwrap();
        assert_eq!(value, b"v2");
    }

    #[test]
    fn incrs_apply_on_top_of_the_latest_set() {
        let value = replay_chain(&chain(&[
            WalFrame::set(b"k", b"0"),
            WalFrame::incr(b"k"),
            WalFrame::incr(b"k"),
        ]))
        .unwrap();
        assert_eq!(value, b"2");
    }

    #[test]
    fn empty_chain_replays_to_zero() {
        assert_eq!(replay_chain(&[]).unwrap(), b"0");
    }

    #[test]
    fn incr_without_a_set_counts_from_zero() {
        let value = replay_chain(&chain(&[WalFrame::incr(b"k"), WalFrame::incr(b"k")])).unwrap();
        assert_eq!(value, b"2");
    }

    #[test]
    fn incr_on_non_numeric_value_falls_back_to_zero() {
        let value = replay_chain(&chain(&[
            WalFrame::set(b"k", b"abc"),
            WalFrame::incr(b"k"),
        ]))
        .unwrap();
        assert_eq!(value, b"1");
    }

    #[test]
    fn setir_and_synthetic_checkpoint_sets_replace_the_value() {
        let value = replay_chain(&chain(&[
            WalFrame::set(b"k", b"old"),
            WalFrame::set_ir(b"k", b"mid"),
            WalFrame::set_checkpoint(b"k", b"new"),
        ]))
        .unwrap();
        assert_eq!(value, b"new");
    }

    #[test]
    fn corrupt_chain_entry_is_an_error() {
        let result = replay_chain(&[b"*1\n$3\nSE".to_vec()]);
        assert!(result.is_err());
    }

    #[test]
    fn textual_int_matches_atoi_semantics() {
        assert_eq!(textual_int(b"42"), 42);
        assert_eq!(textual_int(b"  42"), 42);
        assert_eq!(textual_int(b"-17"), -17);
        assert_eq!(textual_int(b"+8"), 8);
        assert_eq!(textual_int(b"12abc"), 12);
        assert_eq!(textual_int(b"abc"), 0);
        assert_eq!(textual_int(b""), 0);
        assert_eq!(textual_int(b"-"), 0);
    }
}
