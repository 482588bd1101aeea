//! Background worker plumbing
//!
//! Every long-running component (indexer, restorers, checkpointer,
//! telemetry flusher, monitor) runs on its own named OS thread and is
//! stopped cooperatively: the engine sets the worker's cancellation
//! token, the worker notices at its next loop boundary and exits
//! cleanly. No thread is ever killed mid-I/O.

use log::{error, info};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Cooperative cancellation flag, one per worker
///
/// Loop bodies check [`is_cancelled`](Self::is_cancelled) at every I/O
/// boundary; sleeps go through [`sleep_for`](Self::sleep_for) so a
/// cancelled worker wakes up promptly instead of finishing its nap.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleeps up to `duration`, waking early on cancellation
    ///
    /// Returns `false` if the token was cancelled before the full
    /// duration elapsed.
    pub fn sleep_for(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(10);

        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.is_cancelled() {
                return false;
            }
            let nap = remaining.min(SLICE);
            thread::sleep(nap);
            remaining -= nap;
        }
        !self.is_cancelled()
    }
}

/// A named background thread paired with its cancellation token
pub struct WorkerHandle {
    name: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawns a named worker thread
    pub fn spawn<F>(name: &str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(worker_token))?;

        Ok(Self {
            name: name.to_string(),
            token,
            handle,
        })
    }

    /// Sets the worker's cancellation token
    pub fn signal(&self) {
        self.token.cancel();
    }

    /// Waits for the worker to exit
    pub fn join(self) {
        match self.handle.join() {
            Ok(()) => info!("worker '{}' stopped", self.name),
            Err(_) => error!("worker '{}' panicked", self.name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
