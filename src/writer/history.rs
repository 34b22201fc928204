//! writer::history
//!
//! Read-side helpers over written commits.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::core::types::{Oid, RefName};
use crate::store::{read_commit, ObjectStore, StoreError};

/// Summary of one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub id: Oid,
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub author_name: String,
    pub author_email: String,
    pub time: DateTime<FixedOffset>,
    pub message: String,
}

impl CommitInfo {
    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

pub fn commit_info<S: ObjectStore + ?Sized>(store: &S, id: &Oid) -> Result<CommitInfo, StoreError> {
    let record = read_commit(store, id)?;
    Ok(CommitInfo {
        id: id.clone(),
        tree: record.tree,
        parents: record.parents,
        author_name: record.author.name,
        author_email: record.author.email,
        time: record.author.when,
        message: record.message,
    })
}

/// Commit `name` points at, `None` if the ref is missing or unborn.
pub fn head_commit<S: ObjectStore + ?Sized>(
    store: &S,
    name: &RefName,
) -> Result<Option<CommitInfo>, StoreError> {
    match store.resolve_ref(name)? {
        Some(id) => Ok(Some(commit_info(store, &id)?)),
        None => Ok(None),
    }
}

/// Up to `limit` commits following first parents from `start`, newest first.
pub fn log<S: ObjectStore + ?Sized>(
    store: &S,
    start: &Oid,
    limit: usize,
) -> Result<Vec<CommitInfo>, StoreError> {
    let mut commits = Vec::new();
    let mut next = Some(start.clone());
    while let Some(id) = next {
        if commits.len() >= limit {
            break;
        }
        let info = commit_info(store, &id)?;
        next = info.parents.first().cloned();
        commits.push(info);
    }
    Ok(commits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CommitRecord, MemoryStore, Signature, WriteSession};

    #[test]
    fn follows_first_parents() {
        let store = MemoryStore::new();
        let mut session = WriteSession::new(&store, 1024, false);
        let tree = session.put_tree(Vec::new()).unwrap();
        let who = Signature::now("a", "a@example.org");
        let side = session
            .put_commit(&CommitRecord::new(tree.clone(), vec![], who.clone(), "side"))
            .unwrap();
        let first = session
            .put_commit(&CommitRecord::new(tree.clone(), vec![], who.clone(), "first"))
            .unwrap();
        let merge = session
            .put_commit(&CommitRecord::new(tree, vec![first.clone(), side], who, "merge\n\nbody"))
            .unwrap();
        session.finish().unwrap();

        let log = log(&store, &merge, 10).unwrap();
        let summaries: Vec<_> = log.iter().map(CommitInfo::summary).collect();
        assert_eq!(summaries, vec!["merge", "first"]);
        assert_eq!(log[1].id, first);
        assert_eq!(super::log(&store, &merge, 1).unwrap().len(), 1);
    }

    #[test]
    fn unborn_head_has_no_commit() {
        let store = MemoryStore::new();
        assert!(head_commit(&store, &RefName::head()).unwrap().is_none());
    }
}
