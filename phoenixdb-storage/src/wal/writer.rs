use super::WalFrame;
use phoenixdb_core::{Result, SyncMode, WalOffset};

use parking_lot::{Mutex, RwLock};

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hook invoked for every frame that reaches the WAL file
///
/// The observer runs while the append lock is held, after the frame has
/// been written and flushed per the writer's [`SyncMode`], and before
/// `append` returns to the caller. Synchronous indexing installs an
/// observer here, which is what makes a client write and its index entry
/// a single unit: the client does not see an acknowledgement until the
/// observer has returned.
pub trait AppendObserver: Send + Sync {
    fn frame_appended(&self, frame: &WalFrame, start: WalOffset, encoded: &[u8]) -> Result<()>;
}

/// Appender for the write-ahead log
///
/// The writer is thread-safe and shared as `Arc<WalWriter>`. Appends are
/// serialized through an internal mutex, so frames land in the file in a
/// total order and the observer (when installed) sees them in exactly
/// that order.
pub struct WalWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
    /// Byte length of the file, i.e. the offset the next frame starts at
    end_offset: AtomicU64,
    sync_mode: SyncMode,
    observer: RwLock<Option<Arc<dyn AppendObserver>>>,
}

impl WalWriter {
    /// Opens the WAL for appending, creating it if absent
    pub fn open(path: impl AsRef<Path>, sync_mode: SyncMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if parent != Path::new("") {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let end_offset = file.metadata()?.len();

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
            end_offset: AtomicU64::new(end_offset),
            sync_mode,
            observer: RwLock::new(None),
        })
    }

    /// Appends one frame, returning the offset it starts at
    ///
    /// The frame is flushed according to the sync mode, then handed to
    /// the installed observer (if any) before this call returns.
    pub fn append(&self, frame: &WalFrame) -> Result<WalOffset> {
        let encoded = frame.encode();

        let mut file = self.file.lock();
        file.write_all(&encoded)?;

        match self.sync_mode {
            SyncMode::None => {}
            SyncMode::Normal => file.flush()?,
            SyncMode::Full => {
                file.flush()?;
                file.get_ref().sync_all()?;
            }
        }

        let start = self
            .end_offset
            .fetch_add(encoded.len() as u64, Ordering::Relaxed);

        let observer = self.observer.read().clone();
        if let Some(observer) = observer {
            observer.frame_appended(frame, start, &encoded)?;
        }

        Ok(start)
    }

    /// Flushes buffered data and fsyncs the file
    pub fn sync(&self) -> Result<()> {
        let mut file = self.file.lock();
        file.flush()?;
        file.get_ref().sync_all()?;
        Ok(())
    }

    /// Installs the append observer (synchronous indexing)
    pub fn set_observer(&self, observer: Arc<dyn AppendObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// Removes the append observer
    pub fn clear_observer(&self) {
        *self.observer.write() = None;
    }

    /// Offset one past the last appended byte
    pub fn end_offset(&self) -> WalOffset {
        self.end_offset.load(Ordering::Relaxed)
    }

    /// Path of the WAL file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
