//! core::lock
//!
//! Exclusive environment lock for lifecycle operations.
//!
//! # Architecture
//!
//! The environment lock ensures only one airlocal operation can mutate the
//! local environment at a time. Two terminals both running `start` would
//! otherwise race on the cluster, the tunnels, and the state record.
//!
//! The lock is an OS-level exclusive lock on `~/.airlocal/lock`, so it is
//! released automatically when the holding process exits: including
//! crashes and kill -9. No stale-lock recovery is needed.
//!
//! # Invariants
//!
//! - Lock must be held for the entire lifecycle operation
//! - Lock is automatically released on drop (RAII pattern)
//! - Lock acquisition is non-blocking (fails fast if locked)

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::EnvPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("another airlocal operation is already running")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),

    /// I/O error during lock operations.
    #[error("lock i/o error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An exclusive lock on the environment.
///
/// The lock is released when this guard is dropped, so it cannot outlive
/// the operation that acquired it even if that operation panics.
#[derive(Debug)]
pub struct EnvLock {
    /// Path to the lock file.
    path: PathBuf,
    /// The open file handle with the lock held.
    /// When this is Some, we hold the lock.
    file: Option<File>,
}

impl EnvLock {
    /// Attempt to acquire the environment lock.
    ///
    /// Uses OS-level file locking via `fs2`, which works across processes.
    /// Non-blocking: if another process holds the lock this returns
    /// [`LockError::AlreadyLocked`] immediately.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &EnvPaths) -> Result<Self, LockError> {
        fs::create_dir_all(paths.root()).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", paths.root().display(), e))
        })?;

        let path = paths.lock_path();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Try to acquire the lock, returning None if already held.
    pub fn try_acquire(paths: &EnvPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if the lock is currently held by this guard.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    ///
    /// Called automatically on drop; useful when the lock must be released
    /// before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for EnvLock {
    fn drop(&mut self) {
        // Best-effort release on drop - ignore errors since we're dropping
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths(dir: &Path) -> EnvPaths {
        EnvPaths::new(dir.to_path_buf())
    }

    #[test]
    fn lock_acquire_succeeds() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let lock = EnvLock::acquire(&paths).expect("acquire lock");
        assert!(lock.is_held());
        assert!(lock.path().exists());
    }

    #[test]
    fn lock_creates_storage_directory() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(&temp.path().join("fresh"));

        assert!(!paths.root().exists());
        let _lock = EnvLock::acquire(&paths).expect("acquire lock");
        assert!(paths.root().exists());
    }

    #[test]
    fn lock_prevents_second_acquire() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let lock1 = EnvLock::acquire(&paths).expect("first acquire");
        assert!(lock1.is_held());

        let result = EnvLock::acquire(&paths);
        assert!(matches!(result, Err(LockError::AlreadyLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        {
            let lock = EnvLock::acquire(&paths).expect("first acquire");
            assert!(lock.is_held());
            // lock dropped here
        }

        let lock2 = EnvLock::acquire(&paths).expect("second acquire");
        assert!(lock2.is_held());
    }

    #[test]
    fn lock_released_explicitly() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let mut lock = EnvLock::acquire(&paths).expect("acquire");
        lock.release().expect("release");
        assert!(!lock.is_held());

        let lock2 = EnvLock::acquire(&paths).expect("reacquire");
        assert!(lock2.is_held());
    }

    #[test]
    fn try_acquire_returns_none_when_locked() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let _lock1 = EnvLock::acquire(&paths).expect("first acquire");

        let result = EnvLock::try_acquire(&paths).expect("try_acquire");
        assert!(result.is_none());
    }

    #[test]
    fn multiple_release_calls_are_safe() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let mut lock = EnvLock::acquire(&paths).expect("acquire");
        lock.release().expect("first release");
        lock.release().expect("second release should be ok");
        assert!(!lock.is_held());
    }

    #[test]
    fn error_display_formatting() {
        let err = LockError::AlreadyLocked;
        assert!(err.to_string().contains("already running"));

        let err = LockError::CreateFailed("test".into());
        assert!(err.to_string().contains("create"));

        let err = LockError::AcquireFailed("test".into());
        assert!(err.to_string().contains("acquire"));
    }
}
