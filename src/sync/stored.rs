//! sync::stored
//!
//! Cursor over a committed tree in an object store.

use super::cursor::{CursorEntry, TreeCursor};
use crate::core::types::Oid;
use crate::error::WriteError;
use crate::store::{read_tree, ObjectStore};

/// One level of a stored tree. Every entry carries its stored id.
pub struct StoredCursor<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    tree: Option<Oid>,
    entries: Vec<CursorEntry>,
}

impl<'s, S: ObjectStore + ?Sized> StoredCursor<'s, S> {
    /// Open the tree `tree`. An absent or zero id gives an empty level.
    pub fn open(store: &'s S, tree: Option<&Oid>) -> Result<Self, WriteError> {
        let tree = tree.filter(|t| !t.is_zero()).cloned();
        let entries = match &tree {
            Some(oid) => read_tree(store, oid)?
                .into_iter()
                .map(|e| CursorEntry::new(e.name, e.mode, Some(e.oid)))
                .collect(),
            None => Vec::new(),
        };
        Ok(Self {
            store,
            tree,
            entries,
        })
    }

    /// Id of the tree this level was read from.
    pub fn tree_id(&self) -> Option<&Oid> {
        self.tree.as_ref()
    }
}

impl<S: ObjectStore + ?Sized> TreeCursor for StoredCursor<'_, S> {
    fn entries(&self) -> &[CursorEntry] {
        &self.entries
    }

    fn expand(&self, index: usize) -> Result<Option<Self>, WriteError> {
        match self.entries.get(index) {
            Some(entry) if entry.is_tree() => {
                Ok(Some(StoredCursor::open(self.store, entry.oid.as_ref())?))
            }
            _ => Ok(None),
        }
    }
}
