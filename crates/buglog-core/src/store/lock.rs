//! Advisory per-bug file locks.
//!
//! Writers hold an exclusive lock on `bugs/<id>.lock` for the whole
//! read-derive-validate-append sequence; readers take a shared one while
//! loading. Acquisition polls until a bounded timeout expires.

use crate::error::ErrorCode;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// How long a command waits for another `bl` process by default.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock on {} timed out after {waited:?}", .path.display())]
    Timeout { path: PathBuf, waited: Duration },
    #[error("lock i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Timeout { .. } => ErrorCode::LockContention,
            Self::Io(_) => ErrorCode::EntityWriteFailed,
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// RAII guard; the lock is released on drop.
#[derive(Debug)]
pub struct EntityLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl EntityLock {
    /// Exclusive lock for writers.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] if another holder keeps the lock past `timeout`.
    pub fn exclusive(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Self::acquire(path, timeout, LockMode::Exclusive)
    }

    /// Shared lock for readers.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] if a writer keeps the lock past `timeout`.
    pub fn shared(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        Self::acquire(path, timeout, LockMode::Shared)
    }

    fn acquire(path: &Path, timeout: Duration, mode: LockMode) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        loop {
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(&file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            if attempt.is_ok() {
                return Ok(Self {
                    file,
                    path: path.to_path_buf(),
                    mode,
                });
            }
            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    path: path.to_path_buf(),
                    waited: start.elapsed(),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_exclusive(&self) -> bool {
        self.mode == LockMode::Exclusive
    }
}

impl Drop for EntityLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
