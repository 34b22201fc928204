//! store
//!
//! Content-addressable object storage.
//!
//! # Architecture
//!
//! [`ObjectStore`] is the raw contract: hash, read and write objects of the
//! three kinds, resolve and move refs, list reflogs. Two implementations:
//!
//! - [`GitStore`] - a git repository on disk, through the [`Git`](crate::git::Git) doorway
//! - [`MemoryStore`] - an in-process store with SHA-256 ids
//!
//! Writers never call [`ObjectStore::write_object`] directly. They open a
//! [`WriteSession`], which buffers, deduplicates and flushes objects and is
//! released on every exit path.
//!
//! # Invariants
//!
//! - Equal content always yields an equal id
//! - Writing an object twice never grows the store
//! - A missing or malformed object is reported as [`StoreError::Corrupt`]

pub mod git_store;
pub mod memory;
pub mod object;
pub mod session;

use std::path::PathBuf;

use thiserror::Error;

use crate::core::paths::DatagitPaths;
use crate::core::types::{ObjectKind, Oid, RefName, TypeError};
use crate::git::GitError;

pub use git_store::GitStore;
pub use memory::MemoryStore;
pub use object::{CommitRecord, FileMode, Signature, TreeEntry};
pub use session::WriteSession;

/// Errors from object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying read or write failed.
    #[error("object store i/o error: {0}")]
    Io(String),

    /// An object id could not be dereferenced to a well-formed object.
    #[error("corrupt object {oid}: {message}")]
    Corrupt { oid: String, message: String },

    /// A ref update was refused (not a fast-forward, or a concurrent change).
    #[error("ref update rejected for {refname}: {message}")]
    RefRejected { refname: String, message: String },

    #[error("invalid ref: {0}")]
    InvalidRef(String),
}

impl From<GitError> for StoreError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::ObjectNotFound { oid } => StoreError::Corrupt {
                oid,
                message: "object not found".to_string(),
            },
            GitError::UnsupportedKind { oid } => StoreError::Corrupt {
                oid,
                message: "unsupported object kind".to_string(),
            },
            GitError::InvalidOid { oid } => StoreError::Corrupt {
                oid,
                message: "invalid object id".to_string(),
            },
            GitError::CasFailed {
                refname,
                expected,
                actual,
            } => StoreError::RefRejected {
                refname,
                message: format!("expected {expected}, found {actual}"),
            },
            GitError::InvalidRefName { message } => StoreError::InvalidRef(message),
            other => StoreError::Io(other.to_string()),
        }
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidRefName(msg) => StoreError::InvalidRef(msg),
            TypeError::InvalidOid(msg) => StoreError::Corrupt {
                oid: String::new(),
                message: msg,
            },
        }
    }
}

/// A requested ref move.
#[derive(Debug, Clone)]
pub struct RefUpdate {
    pub name: RefName,
    pub new: Oid,
    /// `Some(old)` makes the update conditional on the current value
    /// (`Some(None)`: the ref must not exist). `None` forces.
    pub expected_old: Option<Option<Oid>>,
    pub message: String,
    pub committer: Signature,
    /// Always append a reflog entry for this update, with `committer`.
    pub force_log: bool,
}

/// One entry of a ref's history log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    /// Previous value, `None` when the ref was created.
    pub old: Option<Oid>,
    pub new: Oid,
    pub committer_name: String,
    pub committer_email: String,
    pub message: String,
}

/// Raw content-addressable object store.
pub trait ObjectStore {
    /// The id `data` would get as an object of `kind`.
    fn hash_object(&self, kind: ObjectKind, data: &[u8]) -> Result<Oid, StoreError>;

    fn contains(&self, oid: &Oid) -> Result<bool, StoreError>;

    /// Read an object. Missing objects are [`StoreError::Corrupt`].
    fn read_object(&self, oid: &Oid) -> Result<(ObjectKind, Vec<u8>), StoreError>;

    fn write_object(&self, kind: ObjectKind, data: &[u8]) -> Result<Oid, StoreError>;

    /// Current target of `name`; `None` for a missing or unborn ref.
    fn resolve_ref(&self, name: &RefName) -> Result<Option<Oid>, StoreError>;

    fn update_ref(&self, update: &RefUpdate) -> Result<(), StoreError>;

    /// History of `name`, newest first.
    fn reflog(&self, name: &RefName) -> Result<Vec<ReflogEntry>, StoreError>;

    /// On-disk bookkeeping locations (lock, config, index), if any.
    fn paths(&self) -> Option<&DatagitPaths> {
        None
    }

    /// Length in bytes of this store's object ids.
    fn id_len(&self) -> usize;
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn hash_object(&self, kind: ObjectKind, data: &[u8]) -> Result<Oid, StoreError> {
        (**self).hash_object(kind, data)
    }

    fn contains(&self, oid: &Oid) -> Result<bool, StoreError> {
        (**self).contains(oid)
    }

    fn read_object(&self, oid: &Oid) -> Result<(ObjectKind, Vec<u8>), StoreError> {
        (**self).read_object(oid)
    }

    fn write_object(&self, kind: ObjectKind, data: &[u8]) -> Result<Oid, StoreError> {
        (**self).write_object(kind, data)
    }

    fn resolve_ref(&self, name: &RefName) -> Result<Option<Oid>, StoreError> {
        (**self).resolve_ref(name)
    }

    fn update_ref(&self, update: &RefUpdate) -> Result<(), StoreError> {
        (**self).update_ref(update)
    }

    fn reflog(&self, name: &RefName) -> Result<Vec<ReflogEntry>, StoreError> {
        (**self).reflog(name)
    }

    fn paths(&self) -> Option<&DatagitPaths> {
        (**self).paths()
    }

    fn id_len(&self) -> usize {
        (**self).id_len()
    }
}

fn read_kind<S: ObjectStore + ?Sized>(
    store: &S,
    oid: &Oid,
    expected: ObjectKind,
) -> Result<Vec<u8>, StoreError> {
    let (kind, data) = store.read_object(oid)?;
    if kind != expected {
        return Err(StoreError::Corrupt {
            oid: oid.to_string(),
            message: format!("expected {expected}, found {kind}"),
        });
    }
    Ok(data)
}

/// Read and decode a tree.
pub fn read_tree<S: ObjectStore + ?Sized>(
    store: &S,
    oid: &Oid,
) -> Result<Vec<TreeEntry>, StoreError> {
    let data = read_kind(store, oid, ObjectKind::Tree)?;
    object::decode_tree(oid, &data, store.id_len())
}

/// Read and decode a commit.
pub fn read_commit<S: ObjectStore + ?Sized>(
    store: &S,
    oid: &Oid,
) -> Result<CommitRecord, StoreError> {
    let data = read_kind(store, oid, ObjectKind::Commit)?;
    CommitRecord::decode(oid, &data)
}

/// Root tree of a commit.
pub fn commit_tree_id<S: ObjectStore + ?Sized>(store: &S, commit: &Oid) -> Result<Oid, StoreError> {
    Ok(read_commit(store, commit)?.tree)
}

pub fn read_blob<S: ObjectStore + ?Sized>(store: &S, oid: &Oid) -> Result<Vec<u8>, StoreError> {
    read_kind(store, oid, ObjectKind::Blob)
}

/// Look up a slash-separated path below `tree`.
pub fn find_path<S: ObjectStore + ?Sized>(
    store: &S,
    tree: &Oid,
    path: &str,
) -> Result<Option<TreeEntry>, StoreError> {
    let mut current = tree.clone();
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        let entries = read_tree(store, &current)?;
        let Some(entry) = entries.into_iter().find(|e| e.name == segment) else {
            return Ok(None);
        };
        if segments.peek().is_none() {
            return Ok(Some(entry));
        }
        if !entry.mode.is_tree() {
            return Ok(None);
        }
        current = entry.oid;
    }
    Ok(None)
}

/// Where a file-backed store keeps its git directory, for error messages.
pub(crate) fn describe(paths: Option<&DatagitPaths>) -> PathBuf {
    paths
        .map(|p| p.git_dir.clone())
        .unwrap_or_else(|| PathBuf::from("<memory>"))
}
