//! writer
//!
//! Turning a change set into a commit and moving a ref to it.
//!
//! # Lifecycle of [`CommitWriter::write`]
//!
//! 1. Check the repository info of the target's current commit; a newer
//!    schema version aborts before anything is written
//! 2. Take the repository lock (stores with on-disk bookkeeping only)
//! 3. Open a [`WriteSession`] and synchronize the root against the parent trees
//! 4. Write the commit and flush the session
//! 5. Move the target ref through [`RefUpdater`]
//!
//! Any failure leaves the ref where it was. Objects flushed before the
//! failure stay unreachable from every ref.
//!
//! # Example
//!
//! ```
//! use datagit::core::model::{Change, DiffType};
//! use datagit::store::MemoryStore;
//! use datagit::sync::NoBinaries;
//! use datagit::writer::CommitWriter;
//!
//! let store = MemoryStore::new();
//! let producer = |c: &Change| -> anyhow::Result<Vec<u8>> { Ok(c.path.clone().into_bytes()) };
//! let changes = vec![Change::new("process/p1.json", DiffType::Added)];
//!
//! let commit = CommitWriter::new(&store, &producer, &NoBinaries)
//!     .write("add p1", &changes, &[])
//!     .unwrap();
//! assert_eq!(commit.to_string().len(), 64);
//! ```

pub mod history;
pub mod refs;

use tracing::{debug, info};

use crate::core::config::Config;
use crate::core::info::{parse_info, InfoError, RepositoryInfo, LEGACY_SCHEMA_VERSION};
use crate::core::model::{Change, LibraryLink};
use crate::core::naming;
use crate::core::ops::RepoLock;
use crate::core::types::{Oid, RefName};
use crate::error::WriteError;
use crate::store::{
    commit_tree_id, describe, find_path, read_blob, CommitRecord, ObjectStore, Signature,
    WriteSession,
};
use crate::sync::{
    BinaryResolver, CancelFlag, ChangeCursor, CommitHooks, DataProducer, NoHooks, NoProgress,
    ProgressMonitor, StoredCursor, Synchronizer,
};

pub use history::{commit_info, head_commit, log, CommitInfo};
pub use refs::{is_ancestor, RefOutcome, RefUpdater};

/// Builder for one or more commits against a store.
pub struct CommitWriter<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    producer: &'a dyn DataProducer,
    binaries: &'a dyn BinaryResolver,
    ref_name: Option<RefName>,
    committer: Option<Signature>,
    hooks: Box<dyn CommitHooks + 'a>,
    progress: Box<dyn ProgressMonitor + 'a>,
    libraries: Vec<LibraryLink>,
    cancel: Option<CancelFlag>,
    config: Config,
}

impl<'a, S: ObjectStore + ?Sized> CommitWriter<'a, S> {
    pub fn new(
        store: &'a S,
        producer: &'a dyn DataProducer,
        binaries: &'a dyn BinaryResolver,
    ) -> Self {
        Self {
            store,
            producer,
            binaries,
            ref_name: None,
            committer: None,
            hooks: Box::new(NoHooks),
            progress: Box::new(NoProgress),
            libraries: Vec::new(),
            cancel: None,
            config: Config::default(),
        }
    }

    /// Ref to advance. Defaults to the configured default ref (`HEAD`).
    pub fn ref_name(mut self, name: RefName) -> Self {
        self.ref_name = Some(name);
        self
    }

    /// Author and committer identity. Defaults to the configured identity,
    /// stamped at write time.
    pub fn committer(mut self, committer: Signature) -> Self {
        self.committer = Some(committer);
        self
    }

    pub fn hooks(mut self, hooks: impl CommitHooks + 'a) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn progress(mut self, progress: impl ProgressMonitor + 'a) -> Self {
        self.progress = Box::new(progress);
        self
    }

    /// Library links recorded in the repository info, in this order.
    pub fn libraries(mut self, libraries: Vec<LibraryLink>) -> Self {
        self.libraries = libraries;
        self
    }

    pub fn cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// The ref this writer advances.
    pub fn target(&self) -> RefName {
        self.ref_name
            .clone()
            .unwrap_or_else(|| self.config.default_ref())
    }

    /// Current commit of the target ref.
    pub fn head_commit(&self) -> Result<Option<CommitInfo>, WriteError> {
        Ok(head_commit(self.store, &self.target())?)
    }

    /// Write a commit of `changes` on top of `parents` and move the target ref.
    ///
    /// Parents keep their order; zero ids are skipped.
    pub fn write(
        &mut self,
        message: &str,
        changes: &[Change],
        parents: &[Oid],
    ) -> Result<Oid, WriteError> {
        let target = self.target();
        let current = match self.store.resolve_ref(&target)? {
            Some(oid) => Some(oid),
            None => self.store.resolve_ref(&RefName::head())?,
        };
        if let Some(commit) = &current {
            check_compatible(self.store, commit)?;
        }

        let _lock = match self.store.paths() {
            Some(paths) => Some(RepoLock::acquire(paths)?),
            None => None,
        };

        let parents: Vec<Oid> = parents.iter().filter(|p| !p.is_zero()).cloned().collect();
        let committer = self.committer.clone().unwrap_or_else(|| {
            Signature::now(self.config.committer_name(), self.config.committer_email())
        });
        let info_blob = RepositoryInfo::current()
            .with_libraries(self.libraries.clone())
            .to_json()?;

        let check_existing = self.config.check_existing() && current.is_some();
        let mut session = WriteSession::new(self.store, self.config.buffer_limit(), check_existing);

        let mut parent_cursors = Vec::with_capacity(parents.len());
        for parent in &parents {
            let tree = commit_tree_id(self.store, parent)?;
            parent_cursors.push(Some(StoredCursor::open(self.store, Some(&tree))?));
        }

        let change_cursor = ChangeCursor::new(changes);
        let tree = Synchronizer::new(
            &mut session,
            self.producer,
            self.binaries,
            self.hooks.as_mut(),
            self.progress.as_mut(),
        )
        .with_cancel_flag(self.cancel.as_ref())
        .sync_root(Some(&change_cursor), &parent_cursors, info_blob.as_bytes())?;

        let record = CommitRecord::new(tree.clone(), parents, committer.clone(), message);
        let commit = session.put_commit(&record)?;
        let written = session.finish()?;
        debug!(commit = %commit.short(7), objects = written, "flushed commit objects");

        let updater = if self.config.is_force_ref(&target) {
            RefUpdater::forced(self.store)
        } else {
            RefUpdater::ordinary(self.store)
        };
        let outcome = updater.update(&target, &commit, message, &committer)?;

        info!(
            repo = %describe(self.store.paths()).display(),
            refname = %target,
            commit = %commit,
            tree = %tree.short(7),
            changes = changes.len(),
            outcome = ?outcome,
            "wrote commit"
        );
        Ok(commit)
    }
}

/// Fail if `commit` was written with a newer repository schema.
///
/// A missing or unreadable info file counts as the legacy version.
fn check_compatible<S: ObjectStore + ?Sized>(store: &S, commit: &Oid) -> Result<(), WriteError> {
    let tree = commit_tree_id(store, commit)?;
    let Some(entry) = find_path(store, &tree, naming::REPOSITORY_INFO_FILE)? else {
        debug!(version = LEGACY_SCHEMA_VERSION, "no repository info, assuming legacy");
        return Ok(());
    };
    if entry.mode.is_tree() {
        return Ok(());
    }

    let data = read_blob(store, &entry.oid)?;
    let Ok(text) = String::from_utf8(data) else {
        return Ok(());
    };
    match parse_info(&text) {
        Ok(info) => {
            debug!(version = info.schema_version, "repository info compatible");
            Ok(())
        }
        Err(err @ InfoError::Incompatible { .. }) => Err(err.into()),
        Err(err) => {
            debug!(error = %err, "unreadable repository info, assuming legacy");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::DiffType;
    use crate::store::{read_tree, FileMode, MemoryStore, TreeEntry};
    use crate::sync::NoBinaries;

    fn producer(change: &Change) -> anyhow::Result<Vec<u8>> {
        Ok(format!("{{\"@id\":\"{}\"}}", change.path).into_bytes())
    }

    fn names(store: &MemoryStore, tree: &Oid) -> Vec<String> {
        read_tree(store, tree).unwrap().into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn first_commit_moves_head() {
        let store = MemoryStore::new();
        let changes = vec![Change::new("process/p1.json", DiffType::Added)];
        let commit = CommitWriter::new(&store, &producer, &NoBinaries)
            .write("first", &changes, &[])
            .unwrap();

        assert_eq!(store.resolve_ref(&RefName::head()).unwrap(), Some(commit.clone()));
        let info = commit_info(&store, &commit).unwrap();
        assert!(info.parents.is_empty());
        assert_eq!(info.author_name, "anonymous");
        assert_eq!(names(&store, &info.tree), vec!["process", "repository.json"]);
    }

    #[test]
    fn zero_parents_are_skipped() {
        let store = MemoryStore::new();
        let commit = CommitWriter::new(&store, &producer, &NoBinaries)
            .write("empty", &[], &[Oid::zero()])
            .unwrap();
        assert!(commit_info(&store, &commit).unwrap().parents.is_empty());
    }

    #[test]
    fn libraries_are_recorded_in_order() {
        let store = MemoryStore::new();
        let commit = CommitWriter::new(&store, &producer, &NoBinaries)
            .libraries(vec![LibraryLink::new("zeta", "1"), LibraryLink::new("alpha", "2")])
            .write("libs", &[], &[])
            .unwrap();

        let tree = commit_info(&store, &commit).unwrap().tree;
        let entry = find_path(&store, &tree, naming::REPOSITORY_INFO_FILE)
            .unwrap()
            .unwrap();
        let info = parse_info(&String::from_utf8(read_blob(&store, &entry.oid).unwrap()).unwrap())
            .unwrap();
        let names: Vec<_> = info.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn newer_schema_is_incompatible() {
        let store = MemoryStore::new();
        let mut session = WriteSession::new(&store, 1024, false);
        let info = session.put_blob(br#"{"schemaVersion":99,"libraries":[]}"#).unwrap();
        let tree = session
            .put_tree(vec![TreeEntry::new("repository.json", FileMode::Regular, info)])
            .unwrap();
        let who = Signature::now("a", "a@example.org");
        let commit = session
            .put_commit(&CommitRecord::new(tree, vec![], who, "future"))
            .unwrap();
        session.finish().unwrap();
        store
            .update_ref(&crate::store::RefUpdate {
                name: RefName::head(),
                new: commit.clone(),
                expected_old: None,
                message: "future".to_string(),
                committer: Signature::now("a", "a@example.org"),
                force_log: false,
            })
            .unwrap();

        let before = store.object_count();
        let changes = vec![Change::new("flow/f.json", DiffType::Added)];
        let err = CommitWriter::new(&store, &producer, &NoBinaries)
            .write("next", &changes, &[commit])
            .unwrap_err();
        assert!(matches!(err, WriteError::Incompatible { found: 99, .. }));
        assert_eq!(store.object_count(), before);
    }

    #[test]
    fn head_commit_follows_target() {
        let store = MemoryStore::new();
        let mut writer = CommitWriter::new(&store, &producer, &NoBinaries)
            .ref_name(RefName::for_branch("data").unwrap());
        assert!(writer.head_commit().unwrap().is_none());
        let commit = writer.write("one", &[], &[]).unwrap();
        assert_eq!(writer.head_commit().unwrap().unwrap().id, commit);
        assert!(store.resolve_ref(&RefName::head()).unwrap().is_none());
    }
}
