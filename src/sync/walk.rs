//! sync::walk
//!
//! Lock-step walk over one change level and N parent levels.
//!
//! Rows are the union of names across all sources in canonical order. Each
//! row carries the index of its entry in every source that defines it with
//! the row's kind. The kind comes from the change side when present,
//! otherwise from the first parent that defines the name; parent entries of
//! the other kind are left out of the row.

use std::collections::BTreeMap;

use super::cursor::CursorEntry;
use crate::store::object::canonical_cmp;
use crate::store::FileMode;

/// One name of the merged walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRow {
    pub name: String,
    pub mode: FileMode,
    /// Index into the change level.
    pub change: Option<usize>,
    /// Index into each parent level, parallel to the parent list.
    pub parents: Vec<Option<usize>>,
}

impl MergedRow {
    /// First parent defining this row: `(parent, entry index)`.
    pub fn first_parent(&self) -> Option<(usize, usize)> {
        self.parents
            .iter()
            .enumerate()
            .find_map(|(p, idx)| idx.map(|i| (p, i)))
    }

    pub fn in_parents(&self) -> bool {
        self.first_parent().is_some()
    }
}

/// Iterator over merged rows.
///
/// # Example
///
/// ```
/// use datagit::store::FileMode;
/// use datagit::sync::{CursorEntry, MergedWalk};
///
/// let change = vec![CursorEntry::new("b.json", FileMode::Regular, None)];
/// let parent = vec![
///     CursorEntry::new("a", FileMode::Tree, None),
///     CursorEntry::new("b.json", FileMode::Regular, None),
/// ];
/// let names: Vec<_> = MergedWalk::new(Some(change.as_slice()), &[Some(parent.as_slice())])
///     .map(|row| row.name)
///     .collect();
/// assert_eq!(names, vec!["a", "b.json"]);
/// ```
#[derive(Debug)]
pub struct MergedWalk {
    rows: std::vec::IntoIter<MergedRow>,
}

impl MergedWalk {
    pub fn new(change: Option<&[CursorEntry]>, parents: &[Option<&[CursorEntry]>]) -> Self {
        let mut by_name: BTreeMap<&str, (Option<usize>, Vec<Option<usize>>)> = BTreeMap::new();

        for (i, entry) in change.unwrap_or_default().iter().enumerate() {
            by_name
                .entry(entry.name.as_str())
                .or_insert_with(|| (None, vec![None; parents.len()]))
                .0 = Some(i);
        }
        for (p, level) in parents.iter().enumerate() {
            for (i, entry) in level.unwrap_or_default().iter().enumerate() {
                by_name
                    .entry(entry.name.as_str())
                    .or_insert_with(|| (None, vec![None; parents.len()]))
                    .1[p] = Some(i);
            }
        }

        let parent_entry =
            |p: usize, i: usize| parents.get(p).copied().flatten().and_then(|l| l.get(i));

        let mut rows = Vec::with_capacity(by_name.len());
        for (name, (change_idx, parent_idx)) in by_name {
            let change_mode = change_idx
                .and_then(|i| change.and_then(|l| l.get(i)))
                .map(|e| e.mode);
            let parent_mode = parent_idx
                .iter()
                .enumerate()
                .find_map(|(p, idx)| idx.and_then(|i| parent_entry(p, i)))
                .map(|e| e.mode);
            let Some(mode) = change_mode.or(parent_mode) else {
                continue;
            };

            let parents = parent_idx
                .into_iter()
                .enumerate()
                .map(|(p, idx)| {
                    idx.filter(|&i| {
                        parent_entry(p, i).is_some_and(|e| e.is_tree() == mode.is_tree())
                    })
                })
                .collect();

            rows.push(MergedRow {
                name: name.to_string(),
                mode,
                change: change_idx,
                parents,
            });
        }

        rows.sort_by(|a, b| canonical_cmp(&a.name, a.mode.is_tree(), &b.name, b.mode.is_tree()));
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl Iterator for MergedWalk {
    type Item = MergedRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(name: &str) -> CursorEntry {
        CursorEntry::new(name, FileMode::Regular, None)
    }

    fn tree(name: &str) -> CursorEntry {
        CursorEntry::new(name, FileMode::Tree, None)
    }

    #[test]
    fn union_in_canonical_order() {
        let p1 = vec![blob("a.json"), tree("c")];
        let p2 = vec![tree("a"), blob("b.json")];
        let rows: Vec<_> =
            MergedWalk::new(None, &[Some(p1.as_slice()), Some(p2.as_slice())]).collect();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.json", "a", "b.json", "c"]);
        assert_eq!(rows[0].parents, vec![Some(0), None]);
        assert_eq!(rows[1].parents, vec![None, Some(0)]);
    }

    #[test]
    fn change_side_decides_kind() {
        let change = vec![blob("x")];
        let parent = vec![tree("x")];
        let rows: Vec<_> =
            MergedWalk::new(Some(change.as_slice()), &[Some(parent.as_slice())]).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mode, FileMode::Regular);
        assert_eq!(rows[0].change, Some(0));
        assert_eq!(rows[0].parents, vec![None]);
        assert!(!rows[0].in_parents());
    }

    #[test]
    fn first_parent_decides_kind_without_change() {
        let p1 = vec![blob("x")];
        let p2 = vec![tree("x")];
        let rows: Vec<_> =
            MergedWalk::new(None, &[Some(p1.as_slice()), Some(p2.as_slice())]).collect();
        assert_eq!(rows[0].mode, FileMode::Regular);
        assert_eq!(rows[0].first_parent(), Some((0, 0)));
        assert_eq!(rows[0].parents[1], None);
    }

    #[test]
    fn blobs_of_other_modes_share_the_row() {
        let change = vec![blob("run.sh")];
        let parent = vec![CursorEntry::new("run.sh", FileMode::Executable, None)];
        let rows: Vec<_> =
            MergedWalk::new(Some(change.as_slice()), &[Some(parent.as_slice())]).collect();
        assert_eq!(rows[0].mode, FileMode::Regular);
        assert_eq!(rows[0].parents, vec![Some(0)]);

        let rows: Vec<_> = MergedWalk::new(None, &[Some(parent.as_slice())]).collect();
        assert_eq!(rows[0].mode, FileMode::Executable);
    }

    #[test]
    fn absent_parents_contribute_nothing() {
        let p2 = vec![blob("y")];
        let rows: Vec<_> = MergedWalk::new(None, &[None, Some(p2.as_slice())]).collect();
        assert_eq!(rows[0].first_parent(), Some((1, 0)));
    }

    #[test]
    fn empty_sources_yield_no_rows() {
        assert_eq!(MergedWalk::new(None, &[None, None]).count(), 0);
    }
}
