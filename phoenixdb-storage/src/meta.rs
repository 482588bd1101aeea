//! Crash-safe positioning metadata
//!
//! Recovery progress is recorded in tiny fixed-path files, each holding
//! a single little-endian unsigned 64-bit integer:
//!
//! - the **indexed offset**: all WAL bytes before it are reflected in
//!   the indexed log and durable
//! - the **replica indexed offset**: the same, for the mirror log
//! - the **checkpoint offset**: where the most recent completed full
//!   checkpoint began
//!
//! Each value is a conservative lower bound, so no cross-file atomicity
//! is needed. The write discipline is: sync the data file first, then
//! overwrite the offset file. A missing file reads as 0.

use phoenixdb_core::{Result, WalOffset};

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// One 8-byte little-endian u64 on disk
///
/// `store` replaces the file atomically (write to a temp sibling, fsync,
/// rename), so a crash leaves either the old value or the new one, never
/// a torn write.
pub struct OffsetFile {
    path: PathBuf,
}

impl OffsetFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Reads the stored offset; a missing file is 0
    pub fn load(&self) -> Result<WalOffset> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut buf = [0u8; 8];
        file.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Atomically replaces the stored offset
    pub fn store(&self, offset: WalOffset) -> Result<()> {
        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(&offset.to_le_bytes())?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Deletes the file, resetting the offset to 0
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
