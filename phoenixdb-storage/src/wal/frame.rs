use phoenixdb_core::{Error, Result};

use bytes::{BufMut, BytesMut};

/// Maximum number of arguments a frame may carry
pub const MAX_ARGS: usize = 64;

/// Maximum size of a single argument (10 MB)
pub const MAX_ARG_LEN: usize = 10 * 1024 * 1024;

/// A single framed WAL record
///
/// A frame is an argument vector; the first argument is the command
/// name. Frames are immutable once built and encode deterministically,
/// so the exact bytes appended to the WAL can also be stored verbatim in
/// the indexed log and re-parsed later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalFrame {
    args: Vec<Vec<u8>>,
}

/// Typed view over a frame's command
///
/// Arity mismatches and unrecognized names map to `Other`, which the
/// indexer ignores; the WAL may carry host-store commands that are not
/// part of the redo set.
#[derive(Debug, PartialEq, Eq)]
pub enum WalCommand<'a> {
    Set { key: &'a [u8], value: &'a [u8] },
    Incr { key: &'a [u8] },
    Del { key: &'a [u8] },
    SetCheckpoint { key: &'a [u8], value: &'a [u8] },
    CheckpointEnd { id: &'a [u8] },
    SetIr { key: &'a [u8], value: &'a [u8] },
    Other,
}

/// Outcome of parsing a frame from a byte buffer
#[derive(Debug)]
pub enum FrameParse {
    /// A complete frame occupying `consumed` bytes of the buffer
    Complete { frame: WalFrame, consumed: usize },
    /// The buffer ends mid-frame; more bytes are needed
    Incomplete,
}

impl WalFrame {
    /// Builds a frame from a raw argument vector
    pub fn new(args: Vec<Vec<u8>>) -> Self {
        Self { args }
    }

    /// `SET key value`
    pub fn set(key: &[u8], value: &[u8]) -> Self {
        Self::new(vec![b"SET".to_vec(), key.to_vec(), value.to_vec()])
    }

    /// `INCR key`
    pub fn incr(key: &[u8]) -> Self {
        Self::new(vec![b"INCR".to_vec(), key.to_vec()])
    }

    /// `DEL key`
    pub fn del(key: &[u8]) -> Self {
        Self::new(vec![b"DEL".to_vec(), key.to_vec()])
    }

    /// `SETCHECKPOINT key value`
    pub fn set_checkpoint(key: &[u8], value: &[u8]) -> Self {
        Self::new(vec![
            b"SETCHECKPOINT".to_vec(),
            key.to_vec(),
            value.to_vec(),
        ])
    }

    /// `CHECKPOINTEND id`
    pub fn checkpoint_end(id: u64) -> Self {
        Self::new(vec![
            b"CHECKPOINTEND".to_vec(),
            id.to_string().into_bytes(),
        ])
    }

    /// `SETIR key value`
    pub fn set_ir(key: &[u8], value: &[u8]) -> Self {
        Self::new(vec![b"SETIR".to_vec(), key.to_vec(), value.to_vec()])
    }

    /// The raw argument vector
    pub fn args(&self) -> &[Vec<u8>] {
        &self.args
    }

    /// Classifies the frame against the redo command set
    pub fn command(&self) -> WalCommand<'_> {
        let name = match self.args.first() {
            Some(name) => name.as_slice(),
            None => return WalCommand::Other,
        };

        match (name, self.args.len()) {
            (n, 3) if n.eq_ignore_ascii_case(b"SET") => WalCommand::Set {
                key: &self.args[1],
                value: &self.args[2],
            },
            (n, 2) if n.eq_ignore_ascii_case(b"INCR") => WalCommand::Incr { key: &self.args[1] },
            (n, 2) if n.eq_ignore_ascii_case(b"DEL") => WalCommand::Del { key: &self.args[1] },
            (n, 3) if n.eq_ignore_ascii_case(b"SETCHECKPOINT") => WalCommand::SetCheckpoint {
                key: &self.args[1],
                value: &self.args[2],
            },
            (n, 2) if n.eq_ignore_ascii_case(b"CHECKPOINTEND") => {
                WalCommand::CheckpointEnd { id: &self.args[1] }
            }
            (n, 3) if n.eq_ignore_ascii_case(b"SETIR") => WalCommand::SetIr {
                key: &self.args[1],
                value: &self.args[2],
            },
            _ => WalCommand::Other,
        }
    }

    /// Encodes the frame into its wire representation
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());

        buf.put_u8(b'*');
        buf.put_slice(self.args.len().to_string().as_bytes());
        buf.put_u8(b'\n');
        for arg in &self.args {
            buf.put_u8(b'$');
            buf.put_slice(arg.len().to_string().as_bytes());
            buf.put_u8(b'\n');
            buf.put_slice(arg);
            buf.put_u8(b'\n');
        }

        buf.to_vec()
    }

    /// Exact number of bytes [`encode`](Self::encode) will produce
    pub fn encoded_len(&self) -> usize {
        let mut len = 2 + decimal_width(self.args.len());
        for arg in &self.args {
            len += 3 + decimal_width(arg.len()) + arg.len();
        }
        len
    }

    /// Parses one frame from the front of `buf`
    ///
    /// Returns [`FrameParse::Incomplete`] when the buffer ends inside a
    /// frame (the partial-tail condition), and `Error::Corruption` when
    /// the bytes cannot be the start of a valid frame at all.
    pub fn parse(buf: &[u8]) -> Result<FrameParse> {
        let mut pos = 0;

        let argc = match parse_prefixed_number(buf, &mut pos, b'*', "frame header")? {
            Some(n) => n,
            None => return Ok(FrameParse::Incomplete),
        };
        if argc == 0 || argc > MAX_ARGS {
            return Err(Error::Corruption(format!(
                "frame argument count {} out of range (1..={})",
                argc, MAX_ARGS
            )));
        }

        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            let len = match parse_prefixed_number(buf, &mut pos, b'$', "bulk-string header")? {
                Some(n) => n,
                None => return Ok(FrameParse::Incomplete),
            };
            if len > MAX_ARG_LEN {
                return Err(Error::Corruption(format!(
                    "bulk string length {} exceeds maximum {}",
                    len, MAX_ARG_LEN
                )));
            }
            if buf.len() < pos + len + 1 {
                return Ok(FrameParse::Incomplete);
            }
            args.push(buf[pos..pos + len].to_vec());
            pos += len;
            if buf[pos] != b'\n' {
                return Err(Error::Corruption(
                    "bulk string missing trailing newline".to_string(),
                ));
            }
            pos += 1;
        }

        Ok(FrameParse::Complete {
            frame: WalFrame::new(args),
            consumed: pos,
        })
    }
}

/// Reads `<marker><decimal>\n` at `*pos`, advancing past it
///
/// `Ok(None)` means the buffer ran out before the terminating newline.
fn parse_prefixed_number(
    buf: &[u8],
    pos: &mut usize,
    marker: u8,
    what: &str,
) -> Result<Option<usize>> {
    if *pos >= buf.len() {
        return Ok(None);
    }
    if buf[*pos] != marker {
        return Err(Error::Corruption(format!(
            "expected '{}' at {}, found byte {:#04x}",
            marker as char, what, buf[*pos]
        )));
    }

    let digits_start = *pos + 1;
    let mut end = digits_start;
    loop {
        if end >= buf.len() {
            // Cap how far an unterminated header may run before calling
            // it corruption rather than an unflushed tail.
            if end - digits_start > 20 {
                return Err(Error::Corruption(format!(
                    "unterminated {} length",
                    what
                )));
            }
            return Ok(None);
        }
        if buf[end] == b'\n' {
            break;
        }
        if !buf[end].is_ascii_digit() {
            return Err(Error::Corruption(format!(
                "non-digit byte {:#04x} in {}",
                buf[end], what
            )));
        }
        end += 1;
    }

    if end == digits_start {
        return Err(Error::Corruption(format!("empty length in {}", what)));
    }

    let digits = std::str::from_utf8(&buf[digits_start..end])
        .map_err(|_| Error::Corruption(format!("invalid digits in {}", what)))?;
    let value = digits
        .parse::<usize>()
        .map_err(|_| Error::Corruption(format!("length overflow in {}", what)))?;

    *pos = end + 1;
    Ok(Some(value))
}

fn decimal_width(mut n: usize) -> usize {
    let mut width = 1;
    while n >= 10 {
        n /= 10;
        width += 1;
    }
    width
}


#[cfg(test)]
mod property_tests {
    use super::*;

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parse_inverts_encode_for_arbitrary_argument_vectors(
            args in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8)
        ) {
            let frame = WalFrame::new(args);
            let encoded = frame.encode();
            prop_assert_eq!(encoded.len(), frame.encoded_len());

            match WalFrame::parse(&encoded).unwrap() {
                FrameParse::Complete { frame: parsed, consumed } => {
                    prop_assert_eq!(parsed, frame);
                    prop_assert_eq!(consumed, encoded.len());
                }
                FrameParse::Incomplete => prop_assert!(false, "complete frame parsed as incomplete"),
            }
        }

        /// Every strict prefix of a valid frame is an unflushed tail,
        /// never corruption — the invariant the partial-tail handling
        /// in the tailer rests on.
        #[test]
        fn strict_prefixes_are_incomplete_not_corrupt(
            key in prop::collection::vec(any::<u8>(), 0..32),
            value in prop::collection::vec(any::<u8>(), 0..32),
            fraction in 0.0f64..1.0,
        ) {
            let encoded = WalFrame::set(&key, &value).encode();
            let cut = (encoded.len() as f64 * fraction) as usize;

            match WalFrame::parse(&encoded[..cut]).unwrap() {
                FrameParse::Incomplete => {}
                FrameParse::Complete { .. } => prop_assert!(false, "prefix parsed as complete"),
            }
        }
    }
}
