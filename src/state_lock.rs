//! Cross-process exclusion for the state directory.
//!
//! The in-process mutex in [`crate::pipeline`] only serializes cycles of one
//! process. A `--once` invocation next to a running daemon is a second
//! process writing the same ledger file, so every cycle also holds an
//! exclusive advisory lock on `<state_dir>/.lock`. The lock is released when
//! the [`StateLockGuard`] is dropped (or the process exits).

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

pub const LOCK_FILE_NAME: &str = ".lock";

/// How often a waiting cycle retries the lock.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct StateLock {
    path: PathBuf,
}

/// Proof that the state directory is held exclusively.
#[derive(Debug)]
pub struct StateLockGuard {
    file: File,
}

impl Drop for StateLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl StateLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The lock file inside `state_dir`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(LOCK_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
    }

    /// Take the lock if nobody else holds it.
    ///
    /// `Ok(None)` means another holder (this process or another) has it.
    pub fn try_acquire(&self) -> io::Result<Option<StateLockGuard>> {
        let file = self.open()?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %self.path.display(), "State lock acquired");
                Ok(Some(StateLockGuard { file }))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Wait until the lock is free, polling every [`LOCK_POLL_INTERVAL`].
    pub async fn acquire(&self) -> io::Result<StateLockGuard> {
        let mut logged = false;
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            if !std::mem::replace(&mut logged, true) {
                info!(path = %self.path.display(), "State directory locked by another run; waiting");
            }
            sleep(LOCK_POLL_INTERVAL).await;
        }
    }
}
