//! sync::cursor
//!
//! The merge-walk contract shared by every tree source.
//!
//! A cursor exposes one directory level as a canonically sorted list of
//! entries and builds the cursor of a subtree entry on demand, so a walk
//! never materializes more of a tree than it visits.

use crate::core::types::Oid;
use crate::error::WriteError;
use crate::store::object::canonical_cmp;
use crate::store::FileMode;

/// One entry of a cursor level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorEntry {
    pub name: String,
    pub mode: FileMode,
    /// Known object id for this exact content, `None` if it must be produced.
    pub oid: Option<Oid>,
}

impl CursorEntry {
    pub fn new(name: impl Into<String>, mode: FileMode, oid: Option<Oid>) -> Self {
        Self {
            name: name.into(),
            mode,
            oid,
        }
    }

    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }
}

/// A lazily expandable, ordered view of one tree level.
pub trait TreeCursor: Sized {
    /// Entries of this level in canonical order.
    fn entries(&self) -> &[CursorEntry];

    /// Child cursor of the subtree entry at `index`; `None` for leaves.
    fn expand(&self, index: usize) -> Result<Option<Self>, WriteError>;

    fn position(&self, name: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.name == name)
    }
}

/// Sort entries (with attached payloads) into canonical tree order.
pub(crate) fn sort_canonical<T>(items: &mut [(CursorEntry, T)]) {
    items.sort_by(|(a, _), (b, _)| canonical_cmp(&a.name, a.is_tree(), &b.name, b.is_tree()));
}
