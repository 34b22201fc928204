//! core::paths
//!
//! Centralized path routing for datagit storage locations.
//!
//! # Storage Layout
//!
//! All datagit bookkeeping lives under `<common_dir>/datagit/`:
//! - `config.toml` - Repository configuration
//! - `lock` - Exclusive single-writer lock file
//! - `ids.json` - Persisted path → object id index
//!
//! Bare repositories are the common case for dataset repositories, so no
//! code may assume a working directory exists.
//!
//! # Example
//!
//! ```
//! use datagit::core::paths::DatagitPaths;
//! use std::path::PathBuf;
//!
//! let paths = DatagitPaths::new(PathBuf::from("/data/repo.git"), PathBuf::from("/data/repo.git"));
//!
//! assert_eq!(
//!     paths.repo_config_path(),
//!     PathBuf::from("/data/repo.git/datagit/config.toml")
//! );
//! ```

use std::path::{Path, PathBuf};

use crate::git::RepoInfo;

/// Centralized path routing for datagit storage.
///
/// # Invariants
///
/// - All repo-scoped storage uses `common_dir` (shared across worktrees)
/// - No code outside this module should compute `*.join("datagit")` paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagitPaths {
    /// Path to the git directory of the opened repository.
    pub git_dir: PathBuf,

    /// Path to the shared git directory (refs, objects, config).
    pub common_dir: PathBuf,
}

impl DatagitPaths {
    /// Create a new DatagitPaths from git_dir and common_dir.
    pub fn new(git_dir: PathBuf, common_dir: PathBuf) -> Self {
        Self {
            git_dir,
            common_dir,
        }
    }

    /// Create from repository info returned by the Git interface.
    pub fn from_repo_info(info: &RepoInfo) -> Self {
        Self {
            git_dir: info.git_dir.clone(),
            common_dir: info.common_dir.clone(),
        }
    }

    /// `<common_dir>/datagit`
    pub fn repo_datagit_dir(&self) -> PathBuf {
        self.common_dir.join("datagit")
    }

    /// `<common_dir>/datagit/config.toml`
    pub fn repo_config_path(&self) -> PathBuf {
        self.repo_datagit_dir().join("config.toml")
    }

    /// `<common_dir>/datagit/lock`
    pub fn repo_lock_path(&self) -> PathBuf {
        self.repo_datagit_dir().join("lock")
    }

    /// `<common_dir>/datagit/ids.json`
    pub fn id_index_path(&self) -> PathBuf {
        self.repo_datagit_dir().join("ids.json")
    }

    pub fn common_dir(&self) -> &Path {
        &self.common_dir
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Create the datagit directory if it does not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.repo_datagit_dir())
    }
}
