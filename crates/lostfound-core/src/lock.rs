//! Advisory locking of a state directory.
//!
//! One lock file guards every slot of a [`FileStore`](crate::store::FileStore).
//! Plain reads hold it shared. Writes and read-modify-write transactions
//! hold it exclusively for their whole duration, so no other writer lands
//! between a transaction's read and its write.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::ErrorCode;

const FIRST_BACKOFF: Duration = Duration::from_millis(2);
const MAX_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("state directory busy: waited {waited:?} for {}", path.display())]
    Busy { path: PathBuf, waited: Duration },

    #[error("cannot lock {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Busy { .. } => ErrorCode::LockContention,
            Self::Io { .. } => ErrorCode::StorageWriteFailed,
        }
    }
}

/// How a [`DirLock`] is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Shared,
    Exclusive,
}

/// A held lock on a state directory. Released on drop.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
    access: Access,
}

impl DirLock {
    /// Take the lock file at `path`, backing off between attempts until
    /// `timeout` has passed.
    ///
    /// # Errors
    ///
    /// [`LockError::Busy`] when another holder keeps it past `timeout`,
    /// [`LockError::Io`] when the lock file cannot be opened or locked.
    pub fn acquire(path: &Path, access: Access, timeout: Duration) -> Result<Self, LockError> {
        let io_err = |source| LockError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        let started = Instant::now();
        let deadline = started + timeout;
        let mut backoff = FIRST_BACKOFF;
        loop {
            let attempt = match access {
                Access::Shared => FileExt::try_lock_shared(&file),
                Access::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            match attempt {
                Ok(()) => {
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                        access,
                    });
                }
                Err(err) if !is_contended(&err) => return Err(io_err(err)),
                Err(_) => {}
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(LockError::Busy {
                    path: path.to_path_buf(),
                    waited: started.elapsed(),
                });
            }
            thread::sleep(backoff.min(remaining));
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// Run `body` while the lock at `path` is held exclusively.
    ///
    /// # Errors
    ///
    /// Fails without running `body` when the lock cannot be taken.
    pub fn hold<R>(path: &Path, timeout: Duration, body: impl FnOnce() -> R) -> Result<R, LockError> {
        let lock = Self::acquire(path, Access::Exclusive, timeout)?;
        let result = body();
        drop(lock);
        Ok(result)
    }

    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            tracing::debug!(error = %err, path = %self.path.display(), "unlock failed");
        }
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(30);

    #[test]
    fn shared_holders_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".slots.lock");
        let first = DirLock::acquire(&path, Access::Shared, SHORT).unwrap();
        let second = DirLock::acquire(&path, Access::Shared, SHORT).unwrap();
        assert_eq!(first.access(), Access::Shared);
        assert_eq!(second.path(), path.as_path());
    }

    #[test]
    fn exclusive_holder_turns_readers_away() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".slots.lock");
        let _writer = DirLock::acquire(&path, Access::Exclusive, SHORT).unwrap();

        let started = Instant::now();
        let reader = DirLock::acquire(&path, Access::Shared, SHORT);
        assert!(matches!(reader, Err(LockError::Busy { .. })));
        assert!(started.elapsed() >= SHORT);
    }

    #[test]
    fn hold_releases_after_the_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/.slots.lock");
        let answer = DirLock::hold(&path, SHORT, || 42).unwrap();
        assert_eq!(answer, 42);
        assert!(DirLock::acquire(&path, Access::Exclusive, SHORT).is_ok());
    }

    #[test]
    fn hold_skips_the_body_when_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".slots.lock");
        let _writer = DirLock::acquire(&path, Access::Exclusive, SHORT).unwrap();

        let mut ran = false;
        let result = DirLock::hold(&path, SHORT, || ran = true);
        assert!(result.is_err());
        assert!(!ran);
    }

    #[test]
    fn busy_maps_to_lock_contention() {
        let busy = LockError::Busy {
            path: ".slots.lock".into(),
            waited: SHORT,
        };
        assert_eq!(busy.code(), ErrorCode::LockContention);
        assert!(busy.to_string().contains("busy"));
    }
}
