//! Indexed log: persistent per-key multimap over WAL records
//!
//! The indexed log maps database keys to the sequence of WAL frames
//! that redo them. It is an ordered (or hash-keyed) map from byte-string
//! keys to byte-string values in which duplicate keys are permitted;
//! duplicates for a key are kept in insertion order, which for the
//! indexer's usage means WAL order.
//!
//! ## File Format
//!
//! A 16-byte header followed by variable-size records:
//!
//! ```text
//! Offset  Size  Field      Description
//! ------  ----  -----      -----------
//! 0       8     magic      "PHXILOG\0"
//! 8       2     version    Format version (0x0100 = v1.0)
//! 10      2     flags      Must be 0
//! 12      4     reserved   Must be 0
//! ```
//!
//! ```text
//! Offset  Size  Field      Description
//! ------  ----  -----      -----------
//! 0       4     length     Body size (everything after this field)
//! 4       4     checksum   CRC32 of all following fields
//! 8       1     op         1=Put, 2=Delete-all
//! 9       4     key_len    Key length in bytes
//! 13      4     value_len  Value length in bytes (0 for Delete)
//! 17      var   key        Key data
//! 17+key  var   value      Value data
//! ```
//!
//! The file is append-only; the live key map is rebuilt by scanning it
//! at open. A torn record at the tail (crash during a write) is
//! truncated away; a checksum failure anywhere else fails the open so
//! the caller can fall back to a rebuild.
//!
//! ## Concurrency
//!
//! One writer at a time; mutations serialize on an internal write lock.
//! Handles opened [`OpenMode::ThreadShared`] may be used from many
//! threads, with lookups and scans running alongside the writer.

mod cursor;
mod record;

pub use cursor::ScanCursor;

use record::{RecordRead, MAX_KEY_SIZE, OP_DELETE, OP_PUT, RECORD_HEADER_SIZE};

use phoenixdb_core::{Error, Key, LogStructure, Result, Value};

use log::warn;
use parking_lot::{Mutex, RwLock};

use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes identifying an indexed-log file
pub const INDEXED_LOG_MAGIC: &[u8; 8] = b"PHXILOG\0";

/// Current format version (1.0)
pub const INDEXED_LOG_VERSION: u16 = 0x0100;

/// Size of the file header in bytes
pub const INDEXED_LOG_HEADER_SIZE: usize = 16;

/// How a handle may use the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only; mutations return `Error::StorageEngine`
    Read,
    /// Read-write, single owning thread
    Write,
    /// Read-write, free-threaded handle
    ThreadShared,
}

/// Location of one chain value inside the data file
#[derive(Debug, Clone, Copy)]
struct ValueSlot {
    offset: u64,
    len: u32,
}

/// In-memory key map; the structure decides scan order
enum KeyMap {
    Btree(BTreeMap<Key, Vec<ValueSlot>>),
    Hash(HashMap<Key, Vec<ValueSlot>>),
}

impl KeyMap {
    fn new(structure: LogStructure) -> Self {
        match structure {
            LogStructure::Btree => Self::Btree(BTreeMap::new()),
            LogStructure::Hash => Self::Hash(HashMap::new()),
        }
    }

    fn push(&mut self, key: Key, slot: ValueSlot) {
        match self {
            Self::Btree(map) => map.entry(key).or_default().push(slot),
            Self::Hash(map) => map.entry(key).or_default().push(slot),
        }
    }

    fn remove(&mut self, key: &[u8]) -> Option<Vec<ValueSlot>> {
        match self {
            Self::Btree(map) => map.remove(key),
            Self::Hash(map) => map.remove(key),
        }
    }

    fn get(&self, key: &[u8]) -> Option<&Vec<ValueSlot>> {
        match self {
            Self::Btree(map) => map.get(key),
            Self::Hash(map) => map.get(key),
        }
    }

    fn keys(&self) -> Vec<Key> {
        match self {
            Self::Btree(map) => map.keys().cloned().collect(),
            Self::Hash(map) => map.keys().cloned().collect(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Btree(map) => map.len(),
            Self::Hash(map) => map.len(),
        }
    }
}

struct Inner {
    map: KeyMap,
    /// Append handle; `None` when opened read-only
    writer: Option<File>,
    /// Positioned reads for chain values
    reader: Mutex<File>,
    file_len: u64,
    /// Live chain entries across all keys
    records: u64,
}

/// Persistent per-key multimap backing instant recovery
pub struct IndexedLog {
    inner: RwLock<Inner>,
    path: PathBuf,
    mode: OpenMode,
    structure: LogStructure,
}

impl IndexedLog {
    /// Opens (or, in a write mode, creates) an indexed log
    ///
    /// Scans the data file to rebuild the key map. A torn trailing
    /// record is truncated in write modes and ignored in read mode;
    /// corruption elsewhere fails the open.
    pub fn open(
        path: impl AsRef<Path>,
        mode: OpenMode,
        structure: LogStructure,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer = match mode {
            OpenMode::Read => {
                if !path.exists() {
                    return Err(Error::StorageEngine(format!(
                        "indexed log {} does not exist",
                        path.display()
                    )));
                }
                None
            }
            OpenMode::Write | OpenMode::ThreadShared => {
                if let Some(parent) = path.parent() {
                    if parent != Path::new("") {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                let file = OpenOptions::new()
                    .read(true)
                    .append(true)
                    .create(true)
                    .open(&path)?;
                if file.metadata()?.len() == 0 {
                    write_header(&file)?;
                }
                Some(file)
            }
        };

        let scan = scan_file(&path, structure)?;
        if let Some(boundary) = scan.torn_at {
            match &writer {
                Some(file) => {
                    warn!(
                        "indexed log {}: truncating torn record at {}",
                        path.display(),
                        boundary
                    );
                    file.set_len(boundary)?;
                }
                None => warn!(
                    "indexed log {}: ignoring torn record at {} (read-only)",
                    path.display(),
                    boundary
                ),
            }
        }

        let reader = Mutex::new(File::open(&path)?);

        Ok(Self {
            inner: RwLock::new(Inner {
                map: scan.map,
                writer,
                reader,
                file_len: scan.file_len,
                records: scan.records,
            }),
            path,
            mode,
            structure,
        })
    }

    /// Appends `value` to the duplicate chain for `key`
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let encoded = record::encode_record(OP_PUT, key, value)?;

        let mut inner = self.inner.write();
        let mut file = writable(&inner)?;
        file.write_all(&encoded)?;

        let slot = ValueSlot {
            offset: inner.file_len + (RECORD_HEADER_SIZE + key.len()) as u64,
            len: value.len() as u32,
        };
        inner.file_len += encoded.len() as u64;
        inner.records += 1;
        inner.map.push(key.to_vec(), slot);
        Ok(())
    }

    /// Removes every value for `key`; returns how many were removed
    pub fn delete(&self, key: &[u8]) -> Result<u64> {
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::Corruption(format!(
                "indexed-log key size {} exceeds maximum {}",
                key.len(),
                MAX_KEY_SIZE
            )));
        }

        let mut inner = self.inner.write();
        if inner.map.get(key).is_none() {
            // Nothing live for this key; skip the tombstone.
            writable(&inner)?;
            return Ok(0);
        }

        let encoded = record::encode_record(OP_DELETE, key, b"")?;
        let mut file = writable(&inner)?;
        file.write_all(&encoded)?;
        inner.file_len += encoded.len() as u64;

        let removed = inner.map.remove(key).map(|c| c.len() as u64).unwrap_or(0);
        inner.records -= removed;
        Ok(removed)
    }

    /// Returns `key`'s duplicate chain in insertion order (empty if
    /// the key is absent)
    pub fn lookup(&self, key: &[u8]) -> Result<Vec<Value>> {
        let inner = self.inner.read();
        let slots = match inner.map.get(key) {
            Some(slots) => slots.clone(),
            None => return Ok(Vec::new()),
        };

        let mut values = Vec::with_capacity(slots.len());
        let mut reader = inner.reader.lock();
        for slot in slots {
            let mut value = vec![0u8; slot.len as usize];
            reader.seek(SeekFrom::Start(slot.offset))?;
            reader.read_exact(&mut value)?;
            values.push(value);
        }
        Ok(values)
    }

    /// Whether `key` has at least one chain entry
    pub fn contains(&self, key: &[u8]) -> bool {
        self.inner.read().map.get(key).is_some()
    }

    /// Cursor over all pairs; see [`ScanCursor`]
    pub fn scan(&self) -> ScanCursor<'_> {
        let keys = self.inner.read().map.keys();
        ScanCursor::new(self, keys)
    }

    /// Flushes all buffered state to stable storage
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.read();
        if let Some(file) = &inner.writer {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Closes the log, syncing first
    ///
    /// Dropping the handle without calling this skips the final sync
    /// (the no-sync close variant).
    pub fn close(&self) -> Result<()> {
        self.sync()
    }

    /// Rewrites the data file keeping only live records
    ///
    /// Reclaims the space held by deleted chains and superseded
    /// records; returns the number of bytes reclaimed. The key map and
    /// chain order are unchanged.
    pub fn compact(&self) -> Result<u64> {
        let mut inner = self.inner.write();
        writable(&inner)?;

        let tmp_path = sibling_path(&self.path, "compact");
        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        write_header(&tmp)?;

        let mut new_map = KeyMap::new(self.structure);
        let mut new_len = INDEXED_LOG_HEADER_SIZE as u64;
        {
            let mut reader = inner.reader.lock();
            for key in inner.map.keys() {
                let slots = inner.map.get(&key).cloned().unwrap_or_default();
                for slot in slots {
                    let mut value = vec![0u8; slot.len as usize];
                    reader.seek(SeekFrom::Start(slot.offset))?;
                    reader.read_exact(&mut value)?;

                    let encoded = record::encode_record(OP_PUT, &key, &value)?;
                    tmp.write_all(&encoded)?;
                    new_map.push(
                        key.clone(),
                        ValueSlot {
                            offset: new_len + (RECORD_HEADER_SIZE + key.len()) as u64,
                            len: slot.len,
                        },
                    );
                    new_len += encoded.len() as u64;
                }
            }
        }
        tmp.sync_all()?;
        drop(tmp);

        std::fs::rename(&tmp_path, &self.path)?;

        let reclaimed = inner.file_len.saturating_sub(new_len);
        inner.writer = Some(
            OpenOptions::new()
                .read(true)
                .append(true)
                .open(&self.path)?,
        );
        inner.reader = Mutex::new(File::open(&self.path)?);
        inner.map = new_map;
        inner.file_len = new_len;
        Ok(reclaimed)
    }

    /// Total number of chain entries across all keys
    pub fn record_count(&self) -> u64 {
        self.inner.read().records
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> u64 {
        self.inner.read().map.len() as u64
    }

    /// Size of the data file in bytes
    pub fn file_len(&self) -> u64 {
        self.inner.read().file_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn structure(&self) -> LogStructure {
        self.structure
    }
}

fn writable<'a>(inner: &'a Inner) -> Result<&'a File> {
    inner.writer.as_ref().ok_or_else(|| {
        Error::StorageEngine("indexed log opened read-only".to_string())
    })
}

fn write_header(mut file: &File) -> Result<()> {
    let mut header = [0u8; INDEXED_LOG_HEADER_SIZE];
    header[0..8].copy_from_slice(INDEXED_LOG_MAGIC);
    header[8..10].copy_from_slice(&INDEXED_LOG_VERSION.to_le_bytes());
    // flags and reserved stay zero
    file.write_all(&header)?;
    file.sync_all()?;
    Ok(())
}

struct ScanResult {
    map: KeyMap,
    file_len: u64,
    records: u64,
    torn_at: Option<u64>,
}

fn scan_file(path: &Path, structure: LogStructure) -> Result<ScanResult> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut header = [0u8; INDEXED_LOG_HEADER_SIZE];
    reader.read_exact(&mut header).map_err(|_| {
        Error::InvalidFormat(format!(
            "indexed log {} is shorter than its header",
            path.display()
        ))
    })?;
    if &header[0..8] != INDEXED_LOG_MAGIC {
        return Err(Error::InvalidFormat(format!(
            "indexed log {} has wrong magic bytes",
            path.display()
        )));
    }
    let version = u16::from_le_bytes([header[8], header[9]]);
    if version >> 8 != INDEXED_LOG_VERSION >> 8 {
        return Err(Error::InvalidFormat(format!(
            "unsupported indexed log version {}.{}",
            version >> 8,
            version & 0xFF
        )));
    }

    let mut map = KeyMap::new(structure);
    let mut offset = INDEXED_LOG_HEADER_SIZE as u64;
    let mut records = 0u64;
    let mut torn_at = None;

    loop {
        match record::read_record(&mut reader)? {
            RecordRead::Record {
                op,
                key,
                value,
                consumed,
            } => {
                match op {
                    OP_PUT => {
                        map.push(
                            key.clone(),
                            ValueSlot {
                                offset: offset + (RECORD_HEADER_SIZE + key.len()) as u64,
                                len: value.len() as u32,
                            },
                        );
                        records += 1;
                    }
                    _ => {
                        if let Some(removed) = map.remove(&key) {
                            records -= removed.len() as u64;
                        }
                    }
                }
                offset += consumed;
            }
            RecordRead::Eof => break,
            RecordRead::Torn => {
                torn_at = Some(offset);
                break;
            }
        }
    }

    Ok(ScanResult {
        map,
        file_len: offset,
        records,
        torn_at,
    })
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
