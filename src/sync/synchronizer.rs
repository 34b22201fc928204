//! sync::synchronizer
//!
//! Merges a change set with N parent trees into a new tree, level by level.
//!
//! # Per entry
//!
//! For each row of the [`MergedWalk`] of a level:
//!
//! 1. the repository info file is skipped; it is regenerated at the root
//! 2. a sidecar whose owning leaf is deleted at this level is dropped,
//!    unless changes below it address it as a category
//! 3. a subtree with pending changes below it is synchronized recursively,
//!    and dropped if the result is empty; a sidecar listed by a changed
//!    leaf is rebuilt from the change alone
//! 4. a subtree without pending changes keeps the first parent's id
//! 5. a deleted leaf is dropped
//! 6. a changed leaf is written from the data producer, a sidecar file from
//!    the binary resolver; an unchanged leaf keeps the first parent's id
//!
//! A level that ends up empty is pruned, except the root, which always
//! exists and always carries the repository info blob.
//!
//! Any error aborts the whole walk.

use std::collections::HashSet;

use tracing::debug;

use super::changes::{ChangeCursor, ChangeSlot};
use super::cursor::{CursorEntry, TreeCursor};
use super::hooks::{BinaryResolver, CancelFlag, CommitHooks, DataProducer, ProgressMonitor};
use super::stored::StoredCursor;
use super::walk::{MergedRow, MergedWalk};
use crate::core::naming;
use crate::core::types::Oid;
use crate::error::WriteError;
use crate::store::{FileMode, ObjectStore, TreeEntry, WriteSession};

/// Label of the progress sub-task reported for each data blob.
pub const WRITING_TASK: &str = "Writing";

/// Builds new trees into a write session.
pub struct Synchronizer<'a, 's, S: ObjectStore + ?Sized> {
    session: &'a mut WriteSession<'s, S>,
    producer: &'a dyn DataProducer,
    binaries: &'a dyn BinaryResolver,
    hooks: &'a mut dyn CommitHooks,
    progress: &'a mut dyn ProgressMonitor,
    cancel: Option<&'a CancelFlag>,
}

impl<'a, 's, S: ObjectStore + ?Sized> Synchronizer<'a, 's, S> {
    pub fn new(
        session: &'a mut WriteSession<'s, S>,
        producer: &'a dyn DataProducer,
        binaries: &'a dyn BinaryResolver,
        hooks: &'a mut dyn CommitHooks,
        progress: &'a mut dyn ProgressMonitor,
    ) -> Self {
        Self {
            session,
            producer,
            binaries,
            hooks,
            progress,
            cancel: None,
        }
    }

    pub fn with_cancel_flag(mut self, cancel: Option<&'a CancelFlag>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Synchronize the root tree and append `info` as the repository info file.
    ///
    /// The root is never pruned: an empty dataset still yields a tree that
    /// holds the info file.
    pub fn sync_root(
        &mut self,
        changes: Option<&ChangeCursor<'_>>,
        parents: &[Option<StoredCursor<'s, S>>],
        info: &[u8],
    ) -> Result<Oid, WriteError> {
        let mut entries = self.sync_entries("", changes, parents)?;

        let info_id = self.session.put_blob(info)?;
        entries.push(TreeEntry::new(
            naming::REPOSITORY_INFO_FILE,
            FileMode::Regular,
            info_id,
        ));

        let tree = self.session.put_tree(entries)?;
        self.hooks.on_inserted("", &tree);
        debug!(tree = %tree.short(7), "wrote root tree");
        Ok(tree)
    }

    /// Synchronize the subtree at `prefix`; `None` if it ends up empty.
    pub fn sync_tree(
        &mut self,
        prefix: &str,
        changes: Option<&ChangeCursor<'_>>,
        parents: &[Option<StoredCursor<'s, S>>],
    ) -> Result<Option<Oid>, WriteError> {
        let entries = self.sync_entries(prefix, changes, parents)?;
        if entries.is_empty() {
            debug!(path = prefix, "pruned empty tree");
            return Ok(None);
        }

        let tree = self.session.put_tree(entries)?;
        self.hooks.on_inserted(prefix, &tree);
        debug!(path = prefix, tree = %tree.short(7), "wrote tree");
        Ok(Some(tree))
    }

    fn sync_entries(
        &mut self,
        prefix: &str,
        changes: Option<&ChangeCursor<'_>>,
        parents: &[Option<StoredCursor<'s, S>>],
    ) -> Result<Vec<TreeEntry>, WriteError> {
        let change_level = changes.map(|c| c.entries());
        let parent_levels: Vec<Option<&[CursorEntry]>> = parents
            .iter()
            .map(|p| p.as_ref().map(|c| c.entries()))
            .collect();

        let deleted: HashSet<&str> = changes
            .map(|c| c.deleted_leaves().collect())
            .unwrap_or_default();

        let mut entries = Vec::new();
        for row in MergedWalk::new(change_level, &parent_levels) {
            if prefix.is_empty() {
                self.check_cancelled()?;
            }
            if row.name == naming::REPOSITORY_INFO_FILE {
                continue;
            }

            let path = naming::join(prefix, &row.name);
            let slot = match (changes, row.change) {
                (Some(c), Some(i)) => c.slot(i),
                _ => None,
            };
            let is_category = matches!(slot, Some(ChangeSlot::Dir(_)));
            if row.mode.is_tree() && !is_category && owned_by_deleted(&row.name, &deleted) {
                if row.in_parents() {
                    self.hooks.on_removed(&path);
                }
                debug!(path = %path, "dropped sidecar of deleted entry");
                continue;
            }

            let oid = if row.mode.is_tree() {
                self.handle_tree(&path, &row, changes, slot, parents)?
            } else {
                self.handle_blob(&path, &row, slot, parents)?
            };

            if let Some(oid) = oid.and_then(Oid::non_zero) {
                entries.push(TreeEntry::new(row.name, row.mode, oid));
            }
        }
        Ok(entries)
    }

    fn handle_tree(
        &mut self,
        path: &str,
        row: &MergedRow,
        changes: Option<&ChangeCursor<'_>>,
        slot: Option<&ChangeSlot<'_>>,
        parents: &[Option<StoredCursor<'s, S>>],
    ) -> Result<Option<Oid>, WriteError> {
        match slot {
            Some(ChangeSlot::Dir(_)) => {
                let child = match (changes, row.change) {
                    (Some(c), Some(i)) => c.expand(i)?,
                    _ => None,
                };
                let mut child_parents = Vec::with_capacity(parents.len());
                for (parent, idx) in parents.iter().zip(&row.parents) {
                    let cursor = match (parent, idx) {
                        (Some(p), Some(i)) => p.expand(*i)?,
                        _ => None,
                    };
                    child_parents.push(cursor);
                }

                let result = self.sync_tree(path, child.as_ref(), &child_parents)?;
                if result.is_none() && row.in_parents() {
                    self.hooks.on_removed(path);
                }
                Ok(result)
            }
            Some(ChangeSlot::Sidecar(_)) => {
                let child = match (changes, row.change) {
                    (Some(c), Some(i)) => c.expand(i)?,
                    _ => None,
                };
                let result = self.sync_tree(path, child.as_ref(), &[])?;
                if result.is_none() && row.in_parents() {
                    self.hooks.on_removed(path);
                }
                Ok(result)
            }
            Some(ChangeSlot::RemoveSidecar(_)) => {
                if row.in_parents() {
                    self.hooks.on_removed(path);
                }
                debug!(path, "removed sidecar");
                Ok(None)
            }
            _ => Ok(first_parent_id(row, parents)),
        }
    }

    fn handle_blob(
        &mut self,
        path: &str,
        row: &MergedRow,
        slot: Option<&ChangeSlot<'_>>,
        parents: &[Option<StoredCursor<'s, S>>],
    ) -> Result<Option<Oid>, WriteError> {
        match slot {
            Some(ChangeSlot::Leaf(change)) if change.is_deletion() => {
                self.hooks.on_removed(path);
                Ok(None)
            }
            Some(ChangeSlot::Leaf(change)) => {
                self.progress.sub_task(WRITING_TASK, change);
                let data = self
                    .producer
                    .serialize(change)
                    .map_err(|e| WriteError::serialization(path, &e))?;
                let oid = self.session.put_blob(&data)?;
                self.hooks.on_inserted(path, &oid);
                self.progress.worked(1);
                Ok(Some(oid))
            }
            Some(ChangeSlot::Binary { change, file }) => {
                let data = self
                    .binaries
                    .resolve(change, file)
                    .map_err(|e| WriteError::serialization(path, &e))?;
                Ok(Some(self.session.put_blob(&data)?))
            }
            _ => Ok(first_parent_id(row, parents)),
        }
    }

    fn check_cancelled(&self) -> Result<(), WriteError> {
        match self.cancel {
            Some(flag) if flag.is_cancelled() => Err(WriteError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Id of the row's entry in the first parent that defines it.
fn first_parent_id<S: ObjectStore + ?Sized>(
    row: &MergedRow,
    parents: &[Option<StoredCursor<'_, S>>],
) -> Option<Oid> {
    let (p, i) = row.first_parent()?;
    parents
        .get(p)?
        .as_ref()?
        .entries()
        .get(i)?
        .oid
        .clone()
}

/// Whether `name` is the sidecar of a leaf in `deleted`.
fn owned_by_deleted(name: &str, deleted: &HashSet<&str>) -> bool {
    naming::owner_of_sidecar(name).is_some_and(|owner| deleted.contains(owner.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{Change, DiffType};
    use crate::store::{find_path, read_tree, MemoryStore};
    use crate::sync::hooks::{NoBinaries, NoHooks, NoProgress};

    fn producer(change: &Change) -> anyhow::Result<Vec<u8>> {
        Ok(format!("{{\"path\":\"{}\"}}", change.path).into_bytes())
    }

    fn resolver(_: &Change, file: &str) -> anyhow::Result<Vec<u8>> {
        Ok(file.as_bytes().to_vec())
    }

    fn sync(store: &MemoryStore, changes: &[Change], parents: &[Option<Oid>]) -> Oid {
        let mut session = WriteSession::new(store, 1024, false);
        let cursor = ChangeCursor::new(changes);
        let parent_cursors: Vec<_> = parents
            .iter()
            .map(|p| Some(StoredCursor::open(store, p.as_ref()).unwrap()))
            .collect();
        let mut hooks = NoHooks;
        let mut progress = NoProgress;
        let tree = Synchronizer::new(&mut session, &producer, &resolver, &mut hooks, &mut progress)
            .sync_root(Some(&cursor), &parent_cursors, b"{}")
            .unwrap();
        session.finish().unwrap();
        tree
    }

    fn entry(store: &MemoryStore, tree: &Oid, path: &str) -> Option<Oid> {
        find_path(store, tree, path).unwrap().map(|e| e.oid)
    }

    fn names(store: &MemoryStore, tree: &Oid) -> Vec<String> {
        read_tree(store, tree).unwrap().into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn empty_change_set_yields_info_only_root() {
        let store = MemoryStore::new();
        let root = sync(&store, &[], &[]);
        assert_eq!(names(&store, &root), vec!["repository.json"]);
    }

    #[test]
    fn unchanged_sync_is_idempotent() {
        let store = MemoryStore::new();
        let first = sync(&store, &[Change::new("flow/f.json", DiffType::Added)], &[]);
        let second = sync(&store, &[], &[Some(first.clone())]);
        assert_eq!(first, second);
    }

    #[test]
    fn deleting_last_entry_prunes_category() {
        let store = MemoryStore::new();
        let first = sync(
            &store,
            &[
                Change::new("process/a/p1.json", DiffType::Added),
                Change::new("process/b/p2.json", DiffType::Added),
            ],
            &[],
        );
        let second = sync(
            &store,
            &[Change::new("process/a/p1.json", DiffType::Deleted)],
            &[Some(first)],
        );
        let process = read_tree(&store, &second).unwrap()[0].oid.clone();
        assert_eq!(names(&store, &process), vec!["b"]);
    }

    #[test]
    fn modified_leaf_keeps_unlisted_sidecar() {
        let store = MemoryStore::new();
        let first = sync(
            &store,
            &[Change::new("process/p1.json", DiffType::Added).with_binaries(["doc.pdf"])],
            &[],
        );
        let sidecar = entry(&store, &first, "process/p1_bin");
        assert!(sidecar.is_some());

        let second = sync(
            &store,
            &[Change::new("process/p1.json", DiffType::Modified)],
            &[Some(first.clone())],
        );
        assert_eq!(entry(&store, &second, "process/p1_bin"), sidecar);

        let third = sync(
            &store,
            &[Change::new("process/p1.json", DiffType::Modified).without_binaries()],
            &[Some(second)],
        );
        assert_eq!(entry(&store, &third, "process/p1_bin"), None);
        assert!(entry(&store, &third, "process/p1.json").is_some());
    }

    #[test]
    fn bin_named_category_is_not_a_sidecar() {
        let store = MemoryStore::new();
        let first = sync(
            &store,
            &[
                Change::new("process/Coal.json", DiffType::Added),
                Change::new("process/Coal_bin/p1.json", DiffType::Added),
            ],
            &[],
        );

        let second = sync(
            &store,
            &[Change::new("process/Coal.json", DiffType::Modified)],
            &[Some(first)],
        );
        assert!(entry(&store, &second, "process/Coal_bin/p1.json").is_some());

        let third = sync(
            &store,
            &[
                Change::new("process/Coal.json", DiffType::Deleted),
                Change::new("process/Coal_bin/p2.json", DiffType::Added),
            ],
            &[Some(second)],
        );
        assert_eq!(entry(&store, &third, "process/Coal.json"), None);
        assert!(entry(&store, &third, "process/Coal_bin/p1.json").is_some());
        assert!(entry(&store, &third, "process/Coal_bin/p2.json").is_some());
    }

    #[test]
    fn foreign_modes_pass_through() {
        let store = MemoryStore::new();
        let mut session = WriteSession::new(&store, 1024, false);
        let script = session.put_blob(b"#!/bin/sh").unwrap();
        let root = session
            .put_tree(vec![TreeEntry::new("build.sh", FileMode::Executable, script.clone())])
            .unwrap();
        session.finish().unwrap();

        let next = sync(&store, &[Change::new("flow/f.json", DiffType::Added)], &[Some(root)]);
        let kept = read_tree(&store, &next)
            .unwrap()
            .into_iter()
            .find(|e| e.name == "build.sh")
            .unwrap();
        assert_eq!(kept.mode, FileMode::Executable);
        assert_eq!(kept.oid, script);
    }

    #[test]
    fn cancelled_walk_fails() {
        let store = MemoryStore::new();
        let changes = vec![Change::new("flow/f.json", DiffType::Added)];
        let cursor = ChangeCursor::new(&changes);
        let flag = CancelFlag::new();
        flag.cancel();

        let mut session = WriteSession::new(&store, 1024, false);
        let mut hooks = NoHooks;
        let mut progress = NoProgress;
        let result =
            Synchronizer::new(&mut session, &producer, &NoBinaries, &mut hooks, &mut progress)
                .with_cancel_flag(Some(&flag))
                .sync_root(Some(&cursor), &[], b"{}");
        assert!(matches!(result, Err(WriteError::Cancelled)));
    }

    #[test]
    fn producer_failure_aborts() {
        let store = MemoryStore::new();
        let changes = vec![Change::new("flow/f.json", DiffType::Added)];
        let cursor = ChangeCursor::new(&changes);
        let failing = |_: &Change| -> anyhow::Result<Vec<u8>> { anyhow::bail!("no such flow") };

        let mut session = WriteSession::new(&store, 1024, false);
        let mut hooks = NoHooks;
        let mut progress = NoProgress;
        let result =
            Synchronizer::new(&mut session, &failing, &NoBinaries, &mut hooks, &mut progress)
                .sync_root(Some(&cursor), &[], b"{}");
        match result {
            Err(WriteError::Serialization { path, .. }) => assert_eq!(path, "flow/f.json"),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
