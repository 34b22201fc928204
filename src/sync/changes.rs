//! sync::changes
//!
//! Cursor over a pending change set.
//!
//! Each level groups the change paths by their next segment. A single
//! remaining segment is a leaf slot; more segments make a directory slot
//! expanded on demand. Around a leaf change:
//!
//! - an added or modified leaf `X.json` that lists its binaries also yields
//!   its sidecar directory `X_bin`, whose content is exactly that list; the
//!   stored sidecar is replaced, not merged
//! - a leaf that lists no binaries leaves the stored sidecar alone
//! - a deleted leaf yields no sidecar; the synchronizer drops the stored one
//! - a deleted change whose path is a sidecar directory removes only that
//!   sidecar
//!
//! A data change whose path runs through `X_bin` makes it a category, which
//! takes precedence over any sidecar of the same name.
//!
//! When several changes target the same path, the last one wins.

use std::collections::BTreeMap;

use super::cursor::{sort_canonical, CursorEntry, TreeCursor};
use crate::core::model::Change;
use crate::core::naming;
use crate::error::WriteError;
use crate::store::FileMode;

/// Something below a change level that still has path segments to consume.
#[derive(Debug, Clone)]
struct Item<'c> {
    rest: String,
    target: Target<'c>,
}

#[derive(Debug, Clone)]
enum Target<'c> {
    Data(&'c Change),
    Binary { change: &'c Change, file: String },
}

/// What the change side says about one entry.
#[derive(Debug, Clone)]
pub enum ChangeSlot<'c> {
    /// A data leaf: write the producer's bytes, or drop it if deleted.
    Leaf(&'c Change),
    /// A sidecar file of `change`, `file` relative to the sidecar.
    Binary { change: &'c Change, file: String },
    /// A directory with pending changes below it.
    Dir(Vec<ChangeItem<'c>>),
    /// The sidecar of an added or modified leaf. Replaces the stored one.
    Sidecar(Vec<ChangeItem<'c>>),
    /// Drop this sidecar directory.
    RemoveSidecar(&'c Change),
}

/// Opaque child record of a [`ChangeSlot::Dir`].
#[derive(Debug, Clone)]
pub struct ChangeItem<'c>(Item<'c>);

/// One level of the change set.
#[derive(Debug, Clone)]
pub struct ChangeCursor<'c> {
    entries: Vec<CursorEntry>,
    slots: Vec<ChangeSlot<'c>>,
}

impl<'c> ChangeCursor<'c> {
    /// Root level of a change list.
    pub fn new(changes: &'c [Change]) -> Self {
        let items = changes
            .iter()
            .map(|c| Item {
                rest: c.path.trim_matches('/').to_string(),
                target: Target::Data(c),
            })
            .collect();
        Self::from_items(items)
    }

    fn from_items(items: Vec<Item<'c>>) -> Self {
        let mut slots: BTreeMap<String, ChangeSlot<'c>> = BTreeMap::new();

        for item in items {
            match item.rest.split_once('/') {
                Some((head, tail)) => {
                    let child = ChangeItem(Item {
                        rest: tail.to_string(),
                        target: item.target,
                    });
                    match slots.get_mut(head) {
                        Some(ChangeSlot::Dir(children)) => children.push(child),
                        _ => {
                            slots.insert(head.to_string(), ChangeSlot::Dir(vec![child]));
                        }
                    }
                }
                None => match item.target {
                    Target::Binary { change, file } => {
                        slots.insert(item.rest, ChangeSlot::Binary { change, file });
                    }
                    Target::Data(change) => Self::insert_data(&mut slots, item.rest, change),
                },
            }
        }

        let mut pairs: Vec<(CursorEntry, ChangeSlot<'c>)> = slots
            .into_iter()
            .map(|(name, slot)| {
                let mode = match slot {
                    ChangeSlot::Dir(_) | ChangeSlot::Sidecar(_) | ChangeSlot::RemoveSidecar(_) => {
                        FileMode::Tree
                    }
                    ChangeSlot::Leaf(_) | ChangeSlot::Binary { .. } => FileMode::Regular,
                };
                (CursorEntry::new(name, mode, None), slot)
            })
            .collect();
        sort_canonical(&mut pairs);

        let (entries, slots) = pairs.into_iter().unzip();
        Self { entries, slots }
    }

    fn insert_data(slots: &mut BTreeMap<String, ChangeSlot<'c>>, name: String, change: &'c Change) {
        if change.is_deletion() && naming::owner_of_sidecar(&name).is_some() {
            if !matches!(slots.get(&name), Some(ChangeSlot::Dir(_))) {
                slots.insert(name, ChangeSlot::RemoveSidecar(change));
            }
            return;
        }

        if let Some(sidecar) = naming::sidecar_of(&name) {
            let files = change.binaries.as_ref().filter(|_| !change.is_deletion());
            let existing = slots.get(&sidecar);
            let is_category = matches!(existing, Some(ChangeSlot::Dir(_)));
            let was_replaced = matches!(existing, Some(ChangeSlot::Sidecar(_)));

            match files {
                _ if is_category => {}
                Some(files) => {
                    let items = files
                        .iter()
                        .map(|file| {
                            ChangeItem(Item {
                                rest: file.trim_matches('/').to_string(),
                                target: Target::Binary {
                                    change,
                                    file: file.clone(),
                                },
                            })
                        })
                        .collect();
                    slots.insert(sidecar, ChangeSlot::Sidecar(items));
                }
                None if was_replaced => {
                    slots.remove(&sidecar);
                }
                None => {}
            }
        }
        slots.insert(name, ChangeSlot::Leaf(change));
    }

    pub fn slot(&self, index: usize) -> Option<&ChangeSlot<'c>> {
        self.slots.get(index)
    }

    /// Names of the leaves deleted at this level.
    pub fn deleted_leaves(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .zip(&self.slots)
            .filter_map(|(entry, slot)| match slot {
                ChangeSlot::Leaf(change) if change.is_deletion() => Some(entry.name.as_str()),
                _ => None,
            })
    }
}

impl TreeCursor for ChangeCursor<'_> {
    fn entries(&self) -> &[CursorEntry] {
        &self.entries
    }

    fn expand(&self, index: usize) -> Result<Option<Self>, WriteError> {
        match self.slots.get(index) {
            Some(ChangeSlot::Dir(children) | ChangeSlot::Sidecar(children)) => Ok(Some(
                Self::from_items(children.iter().map(|c| c.0.clone()).collect()),
            )),
            _ => Ok(None),
        }
    }
}
