//! store::git_store
//!
//! Object store backed by a git repository on disk.
//!
//! All access goes through the [`Git`] doorway. Ids are SHA-1. Refs given
//! as `HEAD` act on the branch `HEAD` points at, even before it exists.

use std::path::Path;

use tracing::debug;

use super::{ObjectStore, RefUpdate, ReflogEntry, StoreError};
use crate::core::paths::DatagitPaths;
use crate::core::types::{ObjectKind, Oid, RefName};
use crate::git::Git;

#[derive(Debug)]
pub struct GitStore {
    git: Git,
    paths: DatagitPaths,
}

impl GitStore {
    /// Open an existing repository (bare or not) at or above `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_git(Git::open(path)?))
    }

    /// Create a bare repository at `path`.
    pub fn init_bare(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_git(Git::init_bare(path)?))
    }

    pub fn from_git(git: Git) -> Self {
        let paths = DatagitPaths::from_repo_info(&git.info());
        Self { git, paths }
    }

    pub fn git(&self) -> &Git {
        &self.git
    }
}

impl ObjectStore for GitStore {
    fn hash_object(&self, kind: ObjectKind, data: &[u8]) -> Result<Oid, StoreError> {
        Ok(Git::hash_object(kind, data)?)
    }

    fn contains(&self, oid: &Oid) -> Result<bool, StoreError> {
        Ok(self.git.contains(oid)?)
    }

    fn read_object(&self, oid: &Oid) -> Result<(ObjectKind, Vec<u8>), StoreError> {
        Ok(self.git.read_object(oid)?)
    }

    fn write_object(&self, kind: ObjectKind, data: &[u8]) -> Result<Oid, StoreError> {
        Ok(self.git.write_object(kind, data)?)
    }

    fn resolve_ref(&self, name: &RefName) -> Result<Option<Oid>, StoreError> {
        Ok(self
            .git
            .try_resolve_ref_to_object(name.as_str())?
            .and_then(Oid::non_zero))
    }

    fn update_ref(&self, update: &RefUpdate) -> Result<(), StoreError> {
        let expected = update.expected_old.as_ref().map(|o| o.as_ref());
        if update.force_log {
            let direct = self.git.update_ref_logged(
                update.name.as_str(),
                &update.new,
                expected,
                &update.committer.name,
                &update.committer.email,
                update.committer.when,
                &update.message,
            )?;
            debug!(refname = %direct, new = %update.new.short(7), "ref moved with reflog entry");
        } else {
            let direct =
                self.git
                    .update_ref_cas(update.name.as_str(), &update.new, expected, &update.message)?;
            debug!(refname = %direct, new = %update.new.short(7), "ref moved");
        }
        Ok(())
    }

    fn reflog(&self, name: &RefName) -> Result<Vec<ReflogEntry>, StoreError> {
        Ok(self
            .git
            .reflog(name.as_str())?
            .into_iter()
            .map(|r| ReflogEntry {
                old: r.old.non_zero(),
                new: r.new,
                committer_name: r.committer_name,
                committer_email: r.committer_email,
                message: r.message,
            })
            .collect())
    }

    fn paths(&self) -> Option<&DatagitPaths> {
        Some(&self.paths)
    }

    fn id_len(&self) -> usize {
        20
    }
}
