use phoenixdb_core::{Error, Result};

use bytes::{BufMut, BytesMut};
use crc32fast::Hasher;

use std::io::Read;

pub(super) const OP_PUT: u8 = 1;
pub(super) const OP_DELETE: u8 = 2;

/// len + crc + op + key_len + val_len
pub(super) const RECORD_HEADER_SIZE: usize = 4 + 4 + 1 + 4 + 4;

pub(super) const MAX_KEY_SIZE: usize = 1024 * 1024;
pub(super) const MAX_VALUE_SIZE: usize = 10 * 1024 * 1024;
const MAX_BODY_SIZE: usize = RECORD_HEADER_SIZE - 4 + MAX_KEY_SIZE + MAX_VALUE_SIZE;

/// Outcome of reading one record during a file scan
pub(super) enum RecordRead {
    /// A valid record; `consumed` is its total on-disk size
    Record {
        op: u8,
        key: Vec<u8>,
        value: Vec<u8>,
        consumed: u64,
    },
    /// Clean end of file at a record boundary
    Eof,
    /// The file ends inside a record (torn trailing write)
    Torn,
}

/// Encodes a record: `[len][crc][op][key_len][val_len][key][value]`
///
/// `len` counts everything after itself; the CRC covers everything
/// after the CRC field. All integers little-endian.
pub(super) fn encode_record(op: u8, key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    if key.len() > MAX_KEY_SIZE {
        return Err(Error::Corruption(format!(
            "indexed-log key size {} exceeds maximum {}",
            key.len(),
            MAX_KEY_SIZE
        )));
    }
    if value.len() > MAX_VALUE_SIZE {
        return Err(Error::Corruption(format!(
            "indexed-log value size {} exceeds maximum {}",
            value.len(),
            MAX_VALUE_SIZE
        )));
    }

    let body_len = RECORD_HEADER_SIZE - 4 + key.len() + value.len();
    let mut buf = BytesMut::with_capacity(4 + body_len);

    buf.put_u32_le(body_len as u32);
    buf.put_u32_le(0); // crc placeholder
    buf.put_u8(op);
    buf.put_u32_le(key.len() as u32);
    buf.put_u32_le(value.len() as u32);
    buf.put_slice(key);
    buf.put_slice(value);

    let mut hasher = Hasher::new();
    hasher.update(&buf[8..]);
    let crc = hasher.finalize();
    buf[4..8].copy_from_slice(&crc.to_le_bytes());

    Ok(buf.to_vec())
}

/// Reads one record from a sequential reader
///
/// Distinguishes a clean boundary (`Eof`), a torn trailing record
/// (`Torn` — only possible at the end of an append-only file), and real
/// corruption (a structurally impossible length or a CRC mismatch on a
/// complete record), which fails the scan.
pub(super) fn read_record(reader: &mut impl Read) -> Result<RecordRead> {
    let mut len_buf = [0u8; 4];
    match read_exact_or_eof(reader, &mut len_buf)? {
        ReadOutcome::Full => {}
        ReadOutcome::Empty => return Ok(RecordRead::Eof),
        ReadOutcome::Short => return Ok(RecordRead::Torn),
    }

    let body_len = u32::from_le_bytes(len_buf) as usize;
    if body_len < RECORD_HEADER_SIZE - 4 || body_len > MAX_BODY_SIZE {
        return Err(Error::Corruption(format!(
            "indexed-log record length {} out of range",
            body_len
        )));
    }

    let mut body = vec![0u8; body_len];
    match read_exact_or_eof(reader, &mut body)? {
        ReadOutcome::Full => {}
        ReadOutcome::Empty | ReadOutcome::Short => return Ok(RecordRead::Torn),
    }

    let expected_crc = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    let mut hasher = Hasher::new();
    hasher.update(&body[4..]);
    if hasher.finalize() != expected_crc {
        return Err(Error::Corruption(
            "indexed-log record checksum mismatch".to_string(),
        ));
    }

    let op = body[4];
    if op != OP_PUT && op != OP_DELETE {
        return Err(Error::Corruption(format!(
            "invalid indexed-log record op {}",
            op
        )));
    }

    let key_len = u32::from_le_bytes([body[5], body[6], body[7], body[8]]) as usize;
    let val_len = u32::from_le_bytes([body[9], body[10], body[11], body[12]]) as usize;
    if key_len > MAX_KEY_SIZE
        || val_len > MAX_VALUE_SIZE
        || RECORD_HEADER_SIZE - 4 + key_len + val_len != body_len
    {
        return Err(Error::Corruption(format!(
            "indexed-log record field lengths ({} + {}) disagree with body length {}",
            key_len, val_len, body_len
        )));
    }

    let key = body[13..13 + key_len].to_vec();
    let value = body[13 + key_len..].to_vec();

    Ok(RecordRead::Record {
        op,
        key,
        value,
        consumed: (4 + body_len) as u64,
    })
}

enum ReadOutcome {
    Full,
    Empty,
    Short,
}

fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = reader.read(&mut buf[filled..])?;
        if read == 0 {
            return Ok(if filled == 0 {
                ReadOutcome::Empty
            } else {
                ReadOutcome::Short
            });
        }
        filled += read;
    }
    Ok(ReadOutcome::Full)
}
