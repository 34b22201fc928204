//! writer::refs
//!
//! Moving the target ref after a commit was written.
//!
//! # Policies
//!
//! - Ordinary refs: moved only when absent, equal to the new commit, or an
//!   ancestor of it. The update is conditional on the value read before the
//!   check, so a concurrent move fails with [`StoreError::RefRejected`].
//! - Force refs (`refs/stash` and configured `force_refs`): always moved,
//!   and every move appends a reflog entry with the committer.

use std::collections::{HashSet, VecDeque};

use tracing::info;

use crate::core::types::{Oid, RefName};
use crate::store::{read_commit, ObjectStore, RefUpdate, Signature, StoreError};

/// What a ref update did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefOutcome {
    /// The ref did not exist before.
    Created,
    /// The ref moved forward from `from`.
    FastForward { from: Oid },
    /// The ref was force-moved from `from` (absent if newly created).
    Forced { from: Option<Oid> },
    /// The ref already pointed at the commit.
    Unchanged,
}

/// Applies one ref policy against a store.
#[derive(Debug)]
pub struct RefUpdater<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    force: bool,
}

impl<'s, S: ObjectStore + ?Sized> RefUpdater<'s, S> {
    /// Updater for ordinary, fast-forward only refs.
    pub fn ordinary(store: &'s S) -> Self {
        Self {
            store,
            force: false,
        }
    }

    /// Updater for the force-moved, always-logged ref class.
    pub fn forced(store: &'s S) -> Self {
        Self { store, force: true }
    }

    /// Point `name` at `commit`.
    ///
    /// `message` is the full commit message; ordinary moves log
    /// `commit: <first line>`, forced moves log the message itself.
    pub fn update(
        &self,
        name: &RefName,
        commit: &Oid,
        message: &str,
        committer: &Signature,
    ) -> Result<RefOutcome, StoreError> {
        let current = self.store.resolve_ref(name)?;

        if self.force {
            self.store.update_ref(&RefUpdate {
                name: name.clone(),
                new: commit.clone(),
                expected_old: None,
                message: message.trim_end().to_string(),
                committer: committer.clone(),
                force_log: true,
            })?;
            info!(refname = %name, commit = %commit.short(7), "force-moved ref");
            return Ok(RefOutcome::Forced { from: current });
        }

        let outcome = match &current {
            None => RefOutcome::Created,
            Some(old) if old == commit => return Ok(RefOutcome::Unchanged),
            Some(old) if is_ancestor(self.store, old, commit)? => {
                RefOutcome::FastForward { from: old.clone() }
            }
            Some(old) => {
                return Err(StoreError::RefRejected {
                    refname: name.to_string(),
                    message: format!(
                        "{} is not an ancestor of {}",
                        old.short(7),
                        commit.short(7)
                    ),
                })
            }
        };

        self.store.update_ref(&RefUpdate {
            name: name.clone(),
            new: commit.clone(),
            expected_old: Some(current),
            message: format!("commit: {}", first_line(message)),
            committer: committer.clone(),
            force_log: false,
        })?;
        info!(refname = %name, commit = %commit.short(7), "moved ref");
        Ok(outcome)
    }
}

/// Whether `ancestor` is reachable from `descendant` through parent links.
///
/// A commit counts as its own ancestor.
pub fn is_ancestor<S: ObjectStore + ?Sized>(
    store: &S,
    ancestor: &Oid,
    descendant: &Oid,
) -> Result<bool, StoreError> {
    let mut queue = VecDeque::from([descendant.clone()]);
    let mut seen = HashSet::new();

    while let Some(oid) = queue.pop_front() {
        if &oid == ancestor {
            return Ok(true);
        }
        if !seen.insert(oid.clone()) {
            continue;
        }
        queue.extend(read_commit(store, &oid)?.parents);
    }
    Ok(false)
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default().trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CommitRecord, MemoryStore, WriteSession};

    fn identity() -> Signature {
        Signature::now("tester", "tester@example.org")
    }

    fn commit(store: &MemoryStore, parents: Vec<Oid>, message: &str) -> Oid {
        let mut session = WriteSession::new(store, 0, false);
        let tree = session.put_tree(Vec::new()).unwrap();
        let oid = session
            .put_commit(&CommitRecord::new(tree, parents, identity(), message))
            .unwrap();
        session.finish().unwrap();
        oid
    }

    #[test]
    fn ancestry() {
        let store = MemoryStore::new();
        let a = commit(&store, vec![], "a");
        let b = commit(&store, vec![a.clone()], "b");
        let c = commit(&store, vec![], "c");
        assert!(is_ancestor(&store, &a, &b).unwrap());
        assert!(is_ancestor(&store, &b, &b).unwrap());
        assert!(!is_ancestor(&store, &b, &a).unwrap());
        assert!(!is_ancestor(&store, &c, &b).unwrap());
    }

    mod ordinary {
        use super::*;

        #[test]
        fn creates_then_fast_forwards() {
            let store = MemoryStore::new();
            let name = RefName::head();
            let a = commit(&store, vec![], "first\n\nbody");
            let b = commit(&store, vec![a.clone()], "second");
            let updater = RefUpdater::ordinary(&store);

            assert_eq!(
                updater.update(&name, &a, "first\n\nbody", &identity()).unwrap(),
                RefOutcome::Created
            );
            assert_eq!(
                updater.update(&name, &b, "second", &identity()).unwrap(),
                RefOutcome::FastForward { from: a.clone() }
            );
            assert_eq!(
                updater.update(&name, &b, "second", &identity()).unwrap(),
                RefOutcome::Unchanged
            );

            let log = store.reflog(&name).unwrap();
            assert_eq!(log.len(), 2);
            assert_eq!(log[1].message, "commit: first");
        }

        #[test]
        fn rejects_non_fast_forward() {
            let store = MemoryStore::new();
            let name = RefName::head();
            let a = commit(&store, vec![], "a");
            let c = commit(&store, vec![], "c");
            let updater = RefUpdater::ordinary(&store);
            updater.update(&name, &a, "a", &identity()).unwrap();

            let err = updater.update(&name, &c, "c", &identity()).unwrap_err();
            assert!(matches!(err, StoreError::RefRejected { .. }));
            assert_eq!(store.resolve_ref(&name).unwrap(), Some(a));
        }
    }

    mod forced {
        use super::*;

        #[test]
        fn always_moves_and_logs() {
            let store = MemoryStore::new();
            let name = RefName::stash();
            let a = commit(&store, vec![], "a");
            let c = commit(&store, vec![], "c");
            let updater = RefUpdater::forced(&store);

            assert_eq!(
                updater.update(&name, &a, "snapshot a", &identity()).unwrap(),
                RefOutcome::Forced { from: None }
            );
            assert_eq!(
                updater.update(&name, &c, "snapshot c", &identity()).unwrap(),
                RefOutcome::Forced {
                    from: Some(a.clone())
                }
            );

            let log = store.reflog(&name).unwrap();
            assert_eq!(log.len(), 2);
            assert_eq!(log[0].message, "snapshot c");
            assert_eq!(log[0].committer_name, "tester");
            assert_eq!(log[0].old, Some(a));
        }
    }
}
