//! core::ops::lock
//!
//! Exclusive repository lock for commit writes.
//!
//! # Architecture
//!
//! One write session per repository at a time: the lock is held from the
//! first object write until the target ref has moved. A second writer fails
//! fast with [`LockError::AlreadyLocked`] instead of racing on the same ref.
//!
//! The lock file is `<common_dir>/datagit/lock`, shared by all worktrees.
//!
//! # Invariants
//!
//! - Released automatically on drop (RAII), including on error paths
//! - Acquisition never blocks
//!
//! # Example
//!
//! ```ignore
//! use datagit::core::ops::lock::RepoLock;
//!
//! let lock = RepoLock::acquire(&paths)?;
//! // write objects, move the ref
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::DatagitPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another writer already holds the lock.
    #[error("repository is locked by another datagit writer")]
    AlreadyLocked,

    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),

    #[error("lock i/o error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An exclusive lock on the repository, released when dropped.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    /// `Some` while the OS lock is held.
    file: Option<File>,
}

impl RepoLock {
    /// Acquire the repository lock without blocking.
    ///
    /// Uses an OS-level exclusive file lock (`fs2`), so it also excludes
    /// writers in other processes.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another writer holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &DatagitPaths) -> Result<Self, LockError> {
        let datagit_dir = paths.repo_datagit_dir();
        fs::create_dir_all(&datagit_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", datagit_dir.display(), e))
        })?;

        let path = paths.repo_lock_path();
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

    /// Acquire the lock for a git directory that is its own common dir.
    pub fn acquire_at(git_dir: &Path) -> Result<Self, LockError> {
        let paths = DatagitPaths::new(git_dir.to_path_buf(), git_dir.to_path_buf());
        Self::acquire(&paths)
    }

    /// Like [`acquire`](Self::acquire), but `Ok(None)` when already locked.
    pub fn try_acquire(paths: &DatagitPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard is dropped. Idempotent.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths(dir: &Path) -> DatagitPaths {
        DatagitPaths::new(dir.to_path_buf(), dir.to_path_buf())
    }

    #[test]
    fn lock_acquire_succeeds() {
        let temp = TempDir::new().unwrap();
        let lock = RepoLock::acquire(&test_paths(temp.path())).expect("acquire lock");
        assert!(lock.is_held());
        assert!(lock.path().exists());
    }

    #[test]
    fn lock_creates_datagit_directory() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());
        assert!(!paths.repo_datagit_dir().exists());

        let _lock = RepoLock::acquire(&paths).expect("acquire lock");
        assert!(paths.repo_datagit_dir().exists());
    }

    #[test]
    fn second_writer_is_rejected() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        let _first = RepoLock::acquire(&paths).expect("first acquire");
        assert!(matches!(
            RepoLock::acquire(&paths),
            Err(LockError::AlreadyLocked)
        ));
        assert!(RepoLock::try_acquire(&paths).expect("try_acquire").is_none());
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        {
            let _lock = RepoLock::acquire(&paths).expect("first acquire");
        }

        assert!(RepoLock::acquire(&paths).expect("second acquire").is_held());
    }

    #[test]
    fn release_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(temp.path());

        let mut lock = RepoLock::acquire(&paths).expect("acquire");
        lock.release().expect("first release");
        lock.release().expect("second release");
        assert!(!lock.is_held());

        assert!(RepoLock::acquire(&paths).expect("reacquire").is_held());
    }

    #[test]
    fn acquire_at_uses_datagit_dir() {
        let temp = TempDir::new().unwrap();
        let lock = RepoLock::acquire_at(temp.path()).expect("acquire_at");
        assert_eq!(lock.path(), temp.path().join("datagit").join("lock"));
    }
}
