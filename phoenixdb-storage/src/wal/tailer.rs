use super::frame::{FrameParse, WalFrame};
use phoenixdb_core::{Result, WalOffset};

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

const READ_CHUNK: usize = 64 * 1024;

/// Offset-tracking reader over the WAL
///
/// The tailer reads framed records starting at an arbitrary byte offset
/// and reports the exact position each frame ends at, which is what the
/// indexer persists as the indexed-offset. It is built for a file that
/// is still being appended to:
///
/// - a frame cut short by end-of-file is an unflushed tail, not an
///   error: `read_frame` returns `Ok(None)` and the logical position
///   stays at the frame boundary, so a later call resumes there once
///   the writer has flushed more bytes
/// - a frame that cannot be valid (wrong marker byte, non-digit length)
///   is corruption and surfaces as an error
///
/// The tailer never sleeps; the caller owns the polling cadence.
pub struct WalTailer {
    file: File,
    /// Bytes read from the file but not yet consumed as frames
    buf: Vec<u8>,
    /// Offset of the first byte of `buf` (= end of the last frame)
    position: WalOffset,
}

impl WalTailer {
    /// Opens the WAL positioned at `start`
    pub fn open(path: impl AsRef<Path>, start: WalOffset) -> Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(start))?;
        Ok(Self {
            file,
            buf: Vec::new(),
            position: start,
        })
    }

    /// Offset of the next unread frame boundary
    pub fn position(&self) -> WalOffset {
        self.position
    }

    /// Reads the next complete frame
    ///
    /// Returns the frame and the offset just past it. `Ok(None)` means
    /// the file currently ends at (or inside) the next frame.
    pub fn read_frame(&mut self) -> Result<Option<(WalFrame, WalOffset)>> {
        loop {
            if !self.buf.is_empty() {
                match WalFrame::parse(&self.buf)? {
                    FrameParse::Complete { frame, consumed } => {
                        self.buf.drain(..consumed);
                        self.position += consumed as u64;
                        return Ok(Some((frame, self.position)));
                    }
                    FrameParse::Incomplete => {}
                }
            }

            if self.fill()? == 0 {
                return Ok(None);
            }
        }
    }

    /// Pulls more bytes from the file into the parse buffer
    fn fill(&mut self) -> Result<usize> {
        let old_len = self.buf.len();
        self.buf.resize(old_len + READ_CHUNK, 0);
        let read = self.file.read(&mut self.buf[old_len..])?;
        self.buf.truncate(old_len + read);
        Ok(read)
    }
}
