//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to libgit2. The object store
//! adapter in [`crate::store::git_store`] talks to a repository only through
//! this interface, which returns strong types and normalizes errors into
//! typed failure categories.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::ObjectNotFound`]: Requested object does not exist
//! - [`GitError::CasFailed`]: Compare-and-swap precondition failed
//!
//! # Example
//!
//! ```ignore
//! use datagit::git::Git;
//! use datagit::core::types::ObjectKind;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("/data/repo.git"))?;
//! let oid = git.write_object(ObjectKind::Blob, b"hello")?;
//! let (kind, data) = git.read_object(&oid)?;
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{ObjectKind, Oid, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Compare-and-swap precondition failed.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Object has a kind the dataset object model does not use.
    #[error("unsupported object kind for {oid}")]
    UnsupportedKind { oid: String },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context == "HEAD" {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidRefName {
                message: format!("{}: {}", context, err.message()),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => match err.class() {
                git2::ErrorClass::Os | git2::ErrorClass::Filesystem => GitError::AccessError {
                    message: format!("{}: {}", context, err.message()),
                },
                _ => GitError::Internal {
                    message: format!("{}: {}", context, err.message()),
                },
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to the git directory
    pub git_dir: PathBuf,
    /// Path to the shared git directory (differs from git_dir in worktrees)
    pub common_dir: PathBuf,
    /// Path to the working directory, `None` for bare repositories
    pub work_dir: Option<PathBuf>,
}

/// A reflog entry, newest first when listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogRecord {
    pub old: Oid,
    pub new: Oid,
    pub committer_name: String,
    pub committer_email: String,
    pub message: String,
}

/// The Git interface.
///
/// This is the **single point of interaction** with libgit2. No other module
/// imports `git2` directly.
pub struct Git {
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

/// Maximum depth of symbolic ref chains followed.
const MAX_SYMREF_DEPTH: usize = 5;

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository (bare or not) at or above `path`.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        Ok(Self { repo })
    }

    /// Create a new bare repository at `path`.
    pub fn init_bare(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::init_bare(path)
            .map_err(|e| GitError::from_git2(e, &path.display().to_string()))?;
        Ok(Self { repo })
    }

    /// Get repository information.
    pub fn info(&self) -> RepoInfo {
        RepoInfo {
            git_dir: self.repo.path().to_path_buf(),
            common_dir: self.repo.commondir().to_path_buf(),
            work_dir: self.repo.workdir().map(Path::to_path_buf),
        }
    }

    /// Get direct access to the git directory path.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    // =========================================================================
    // Object Database
    // =========================================================================

    /// Compute the id `data` would have as an object of `kind`, without writing.
    pub fn hash_object(kind: ObjectKind, data: &[u8]) -> Result<Oid, GitError> {
        let oid = git2::Oid::hash_object(to_git2_kind(kind), data)?;
        Ok(from_git2_oid(oid)?)
    }

    /// Write a raw object and return its id.
    pub fn write_object(&self, kind: ObjectKind, data: &[u8]) -> Result<Oid, GitError> {
        let odb = self
            .repo
            .odb()
            .map_err(|e| GitError::from_git2(e, "odb"))?;
        let oid = odb
            .write(to_git2_kind(kind), data)
            .map_err(|e| GitError::from_git2(e, "odb write"))?;
        Ok(from_git2_oid(oid)?)
    }

    /// Read a raw object.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the object does not exist
    /// - [`GitError::UnsupportedKind`] for tags and other kinds
    pub fn read_object(&self, oid: &Oid) -> Result<(ObjectKind, Vec<u8>), GitError> {
        let git_oid = to_git2_oid(oid)?;
        let odb = self
            .repo
            .odb()
            .map_err(|e| GitError::from_git2(e, "odb"))?;
        let object = odb
            .read(git_oid)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        let kind = match object.kind() {
            git2::ObjectType::Blob => ObjectKind::Blob,
            git2::ObjectType::Tree => ObjectKind::Tree,
            git2::ObjectType::Commit => ObjectKind::Commit,
            _ => {
                return Err(GitError::UnsupportedKind {
                    oid: oid.to_string(),
                })
            }
        };
        Ok((kind, object.data().to_vec()))
    }

    /// Check whether the object database holds `oid`.
    pub fn contains(&self, oid: &Oid) -> Result<bool, GitError> {
        let git_oid = to_git2_oid(oid)?;
        let odb = self
            .repo
            .odb()
            .map_err(|e| GitError::from_git2(e, "odb"))?;
        Ok(odb.exists(git_oid))
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Follow symbolic refs from `refname` to the direct ref they name.
    ///
    /// The final name need not exist yet: an unborn `HEAD` resolves to the
    /// branch it points at.
    pub fn resolve_symbolic(&self, refname: &str) -> Result<String, GitError> {
        let mut name = refname.to_string();
        for _ in 0..MAX_SYMREF_DEPTH {
            match self.repo.find_reference(&name) {
                Ok(reference) => match reference.symbolic_target() {
                    Some(target) => name = target.to_string(),
                    None => return Ok(name),
                },
                Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(name),
                Err(e) => return Err(GitError::from_git2(e, &name)),
            }
        }
        Err(GitError::InvalidRefName {
            message: format!("symbolic ref chain too deep at {refname}"),
        })
    }

    /// Resolve a ref to the object it targets, `None` if it does not exist.
    pub fn try_resolve_ref_to_object(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        let direct = self.resolve_symbolic(refname)?;
        match self.repo.find_reference(&direct) {
            Ok(reference) => {
                let oid = reference.target().ok_or_else(|| GitError::Internal {
                    message: format!("ref {} has no target", direct),
                })?;
                Ok(Some(from_git2_oid(oid)?))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, &direct)),
        }
    }

    // =========================================================================
    // Ref Mutation
    // =========================================================================

    /// Point `refname` (after following symbolic refs) at `new_oid`.
    ///
    /// With `expected_old = Some(..)` the update only succeeds if the ref's
    /// current value matches; `Some(None)` requires that it does not exist.
    /// `None` skips the check.
    pub fn update_ref_cas(
        &self,
        refname: &str,
        new_oid: &Oid,
        expected_old: Option<Option<&Oid>>,
        message: &str,
    ) -> Result<String, GitError> {
        let direct = self.resolve_symbolic(refname)?;
        let current = self.try_resolve_ref_to_object(&direct)?;

        if let Some(expected) = expected_old {
            if expected != current.as_ref() {
                return Err(GitError::CasFailed {
                    refname: direct,
                    expected: expected.map_or("<none>".to_string(), Oid::to_string),
                    actual: current.map_or("<none>".to_string(), |o| o.to_string()),
                });
            }
        }

        self.repo
            .reference(&direct, to_git2_oid(new_oid)?, true, message)
            .map_err(|e| GitError::from_git2(e, &direct))?;

        Ok(direct)
    }

    /// Like [`update_ref_cas`](Self::update_ref_cas), but always leaves exactly
    /// one new reflog entry carrying the given identity.
    ///
    /// libgit2 logs some refs on its own (branches, `HEAD`, refs that already
    /// have a log) with the repository's default identity; such an entry is
    /// replaced.
    #[allow(clippy::too_many_arguments)]
    pub fn update_ref_logged(
        &self,
        refname: &str,
        new_oid: &Oid,
        expected_old: Option<Option<&Oid>>,
        name: &str,
        email: &str,
        time: chrono::DateTime<chrono::FixedOffset>,
        message: &str,
    ) -> Result<String, GitError> {
        let direct = self.resolve_symbolic(refname)?;
        let before = self
            .repo
            .reflog(&direct)
            .map_err(|e| GitError::from_git2(e, &direct))?
            .len();

        self.update_ref_cas(&direct, new_oid, expected_old, message)?;

        let mut reflog = self
            .repo
            .reflog(&direct)
            .map_err(|e| GitError::from_git2(e, &direct))?;
        if reflog.len() > before {
            reflog
                .remove(0, false)
                .map_err(|e| GitError::from_git2(e, &direct))?;
            reflog
                .write()
                .map_err(|e| GitError::from_git2(e, &direct))?;
        }
        self.append_reflog(&direct, new_oid, name, email, time, message)?;
        Ok(direct)
    }

    // =========================================================================
    // Reflog
    // =========================================================================

    /// List the reflog of `refname`, newest entry first.
    pub fn reflog(&self, refname: &str) -> Result<Vec<ReflogRecord>, GitError> {
        let direct = self.resolve_symbolic(refname)?;
        let reflog = self
            .repo
            .reflog(&direct)
            .map_err(|e| GitError::from_git2(e, &direct))?;

        let mut entries = Vec::with_capacity(reflog.len());
        for entry in reflog.iter() {
            let committer = entry.committer();
            entries.push(ReflogRecord {
                old: from_git2_oid(entry.id_old())?,
                new: from_git2_oid(entry.id_new())?,
                committer_name: committer.name().unwrap_or("").to_string(),
                committer_email: committer.email().unwrap_or("").to_string(),
                message: entry.message().unwrap_or("").to_string(),
            });
        }
        Ok(entries)
    }

    /// Append a reflog entry for `refname` and persist the reflog.
    pub fn append_reflog(
        &self,
        refname: &str,
        new_oid: &Oid,
        name: &str,
        email: &str,
        time: chrono::DateTime<chrono::FixedOffset>,
        message: &str,
    ) -> Result<(), GitError> {
        let direct = self.resolve_symbolic(refname)?;
        let offset_minutes = time.offset().local_minus_utc() / 60;
        let signature = git2::Signature::new(
            name,
            email,
            &git2::Time::new(time.timestamp(), offset_minutes),
        )
        .map_err(|e| GitError::from_git2(e, "signature"))?;

        let mut reflog = self
            .repo
            .reflog(&direct)
            .map_err(|e| GitError::from_git2(e, &direct))?;
        reflog
            .append(to_git2_oid(new_oid)?, &signature, Some(message))
            .map_err(|e| GitError::from_git2(e, &direct))?;
        reflog
            .write()
            .map_err(|e| GitError::from_git2(e, &direct))?;
        Ok(())
    }
}

fn to_git2_kind(kind: ObjectKind) -> git2::ObjectType {
    match kind {
        ObjectKind::Blob => git2::ObjectType::Blob,
        ObjectKind::Tree => git2::ObjectType::Tree,
        ObjectKind::Commit => git2::ObjectType::Commit,
    }
}

fn to_git2_oid(oid: &Oid) -> Result<git2::Oid, GitError> {
    git2::Oid::from_str(oid.as_str()).map_err(|_| GitError::InvalidOid {
        oid: oid.to_string(),
    })
}

fn from_git2_oid(oid: git2::Oid) -> Result<Oid, TypeError> {
    Oid::new(oid.to_string())
}
