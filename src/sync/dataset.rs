//! sync::dataset
//!
//! Canonical cursor over the live dataset, and the diff of a dataset
//! against a commit.
//!
//! # Layout
//!
//! ```text
//! <entity type folder>/                one per type with categories or entities
//!     <category>/ ... <category>/      encoded category names
//!         <ref_id>.json                leaf entities
//! ```
//!
//! Entry ids come from an [`IdIndex`]: a leaf or subtree whose path is
//! indexed is taken to be unchanged, so its stored id is reused without
//! serializing anything.

use std::collections::HashMap;

use super::cursor::{sort_canonical, CursorEntry, TreeCursor};
use super::index::IdIndex;
use super::stored::StoredCursor;
use super::walk::MergedWalk;
use crate::core::model::{Change, DiffType, EntityType};
use crate::core::naming;
use crate::error::WriteError;
use crate::store::{FileMode, ObjectStore};

/// A dataset category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub entity_type: EntityType,
    pub parent: Option<i64>,
}

/// A root entity of the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub ref_id: String,
    pub entity_type: EntityType,
    pub category: Option<i64>,
}

/// The relational dataset, seen through the queries the cursor needs.
pub trait Dataset {
    fn categories(&self) -> anyhow::Result<Vec<Category>>;

    /// Entities of `entity_type` directly in `category` (`None`: uncategorized).
    fn descriptors(
        &self,
        entity_type: EntityType,
        category: Option<i64>,
    ) -> anyhow::Result<Vec<Descriptor>>;
}

/// Category ids resolved to canonical path names.
#[derive(Debug, Clone, Default)]
pub struct PathLookup {
    categories: HashMap<i64, Category>,
    paths: HashMap<i64, String>,
    children: HashMap<(EntityType, Option<i64>), Vec<i64>>,
}

impl PathLookup {
    pub fn new(categories: Vec<Category>) -> Self {
        let mut lookup = Self::default();
        for category in categories {
            lookup
                .children
                .entry((category.entity_type, category.parent))
                .or_default()
                .push(category.id);
            lookup.categories.insert(category.id, category);
        }

        let ids: Vec<i64> = lookup.categories.keys().copied().collect();
        for id in ids {
            if let Some(path) = lookup.compute_path(id) {
                lookup.paths.insert(id, path);
            }
        }
        lookup
    }

    /// Walk up the parent chain; `None` on a cycle or a dangling parent.
    fn compute_path(&self, id: i64) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        let mut entity_type = None;
        while let Some(cid) = current {
            if segments.len() > self.categories.len() {
                return None;
            }
            let category = self.categories.get(&cid)?;
            segments.push(naming::encode_segment(&category.name));
            entity_type = Some(category.entity_type);
            current = category.parent;
        }
        let mut path = entity_type?.folder().to_string();
        for segment in segments.iter().rev() {
            path = naming::join(&path, segment);
        }
        Some(path)
    }

    /// Full path of a category, e.g. `process/Energy/Coal`.
    pub fn path_of(&self, category: i64) -> Option<&str> {
        self.paths.get(&category).map(String::as_str)
    }

    /// Full leaf path of an entity.
    pub fn path_of_descriptor(&self, descriptor: &Descriptor) -> String {
        let folder = descriptor
            .category
            .and_then(|c| self.path_of(c))
            .unwrap_or(descriptor.entity_type.folder());
        naming::join(folder, &naming::leaf_name(&descriptor.ref_id))
    }

    pub fn category(&self, id: i64) -> Option<&Category> {
        self.categories.get(&id)
    }

    /// Child categories, `parent = None` for the roots of a type.
    pub fn children(&self, entity_type: EntityType, parent: Option<i64>) -> &[i64] {
        self.children
            .get(&(entity_type, parent))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Resolve every category of `dataset` to its path.
pub fn paths_of_categories(dataset: &dyn Dataset) -> Result<PathLookup, WriteError> {
    let categories = dataset
        .categories()
        .map_err(|e| WriteError::Dataset(format!("{e:#}")))?;
    Ok(PathLookup::new(categories))
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Type(EntityType),
    Category(EntityType, i64),
    Entity,
}

/// One level of the live dataset.
pub struct DatasetCursor<'d> {
    dataset: &'d dyn Dataset,
    lookup: &'d PathLookup,
    index: Option<&'d IdIndex>,
    entries: Vec<CursorEntry>,
    nodes: Vec<Node>,
}

impl<'d> DatasetCursor<'d> {
    /// Top level: one entry per entity type with at least one category or entity.
    pub fn root(
        dataset: &'d dyn Dataset,
        lookup: &'d PathLookup,
        index: Option<&'d IdIndex>,
    ) -> Result<Self, WriteError> {
        let mut pairs = Vec::new();
        for entity_type in EntityType::ALL {
            let populated = !lookup.children(entity_type, None).is_empty()
                || !query(dataset, entity_type, None)?.is_empty();
            if populated {
                let folder = entity_type.folder();
                let oid = index.and_then(|i| i.get(folder)).cloned();
                pairs.push((
                    CursorEntry::new(folder, FileMode::Tree, oid),
                    Node::Type(entity_type),
                ));
            }
        }
        Ok(Self::from_pairs(dataset, lookup, index, pairs))
    }

    fn from_pairs(
        dataset: &'d dyn Dataset,
        lookup: &'d PathLookup,
        index: Option<&'d IdIndex>,
        mut pairs: Vec<(CursorEntry, Node)>,
    ) -> Self {
        sort_canonical(&mut pairs);
        let (entries, nodes) = pairs.into_iter().unzip();
        Self {
            dataset,
            lookup,
            index,
            entries,
            nodes,
        }
    }

    /// Child categories then entities of one type or category.
    fn level(&self, entity_type: EntityType, category: Option<i64>) -> Result<Self, WriteError> {
        let indexed = |path: &str| self.index.and_then(|i| i.get(path)).cloned();
        let mut pairs = Vec::new();

        for &child in self.lookup.children(entity_type, category) {
            let (Some(info), Some(path)) = (self.lookup.category(child), self.lookup.path_of(child))
            else {
                continue;
            };
            pairs.push((
                CursorEntry::new(
                    naming::encode_segment(&info.name),
                    FileMode::Tree,
                    indexed(path),
                ),
                Node::Category(entity_type, child),
            ));
        }

        for descriptor in query(self.dataset, entity_type, category)? {
            let path = self.lookup.path_of_descriptor(&descriptor);
            pairs.push((
                CursorEntry::new(
                    naming::leaf_name(&descriptor.ref_id),
                    FileMode::Regular,
                    indexed(&path),
                ),
                Node::Entity,
            ));
        }

        Ok(Self::from_pairs(self.dataset, self.lookup, self.index, pairs))
    }
}

fn query(
    dataset: &dyn Dataset,
    entity_type: EntityType,
    category: Option<i64>,
) -> Result<Vec<Descriptor>, WriteError> {
    dataset
        .descriptors(entity_type, category)
        .map_err(|e| WriteError::Dataset(format!("{e:#}")))
}

impl TreeCursor for DatasetCursor<'_> {
    fn entries(&self) -> &[CursorEntry] {
        &self.entries
    }

    fn expand(&self, index: usize) -> Result<Option<Self>, WriteError> {
        match self.nodes.get(index) {
            Some(Node::Type(t)) => Ok(Some(self.level(*t, None)?)),
            Some(Node::Category(t, id)) => Ok(Some(self.level(*t, Some(*id))?)),
            Some(Node::Entity) | None => Ok(None),
        }
    }
}

/// The changes that would bring the tree of a commit in line with the dataset.
///
/// Entries only in the dataset are added, entries only in the tree are
/// deleted, and leaves whose indexed id is missing or differs are modified.
/// Subtrees with equal known ids are not descended. Sidecar directories and
/// the repository info file are not dataset entries and are ignored.
pub fn diff_dataset<S: ObjectStore + ?Sized>(
    dataset: &DatasetCursor<'_>,
    stored: &StoredCursor<'_, S>,
) -> Result<Vec<Change>, WriteError> {
    let mut changes = Vec::new();
    diff_level("", Some(dataset), Some(stored), &mut changes)?;
    Ok(changes)
}

fn diff_level<S: ObjectStore + ?Sized>(
    prefix: &str,
    dataset: Option<&DatasetCursor<'_>>,
    stored: Option<&StoredCursor<'_, S>>,
    changes: &mut Vec<Change>,
) -> Result<(), WriteError> {
    let live = dataset.map(|d| d.entries());
    let committed = stored.map(|s| s.entries());

    for row in MergedWalk::new(live, &[committed]) {
        if prefix.is_empty() && row.name == naming::REPOSITORY_INFO_FILE {
            continue;
        }
        let path = naming::join(prefix, &row.name);
        let live_entry = row.change.and_then(|i| live.and_then(|l| l.get(i)));
        let stored_idx = row.parents.first().copied().flatten();
        let stored_entry = stored_idx.and_then(|i| committed.and_then(|c| c.get(i)));

        if live_entry.is_none() && row.mode.is_tree() && is_sidecar(&row.name, live, committed) {
            continue;
        }

        // A stored entry of the other kind is superseded by the live one.
        if live_entry.is_some() && stored_entry.is_none() {
            if let Some((idx, other)) = other_kind(committed, &row.name, row.mode) {
                deleted_below(prefix, stored, idx, other, changes)?;
            }
        }

        if !row.mode.is_tree() {
            match (live_entry, stored_entry) {
                (Some(_), None) => changes.push(Change::new(path, DiffType::Added)),
                (None, Some(_)) => changes.push(Change::new(path, DiffType::Deleted)),
                (Some(live), Some(committed)) => {
                    if live.oid.is_none() || live.oid != committed.oid {
                        changes.push(Change::new(path, DiffType::Modified));
                    }
                }
                (None, None) => {}
            }
            continue;
        }

        if let (Some(live), Some(committed)) = (live_entry, stored_entry) {
            if live.oid.is_some() && live.oid == committed.oid {
                continue;
            }
        }
        let live_child = match (dataset, row.change) {
            (Some(d), Some(i)) => d.expand(i)?,
            _ => None,
        };
        let stored_child = match (stored, stored_idx) {
            (Some(s), Some(i)) => s.expand(i)?,
            _ => None,
        };
        diff_level(&path, live_child.as_ref(), stored_child.as_ref(), changes)?;
    }
    Ok(())
}

/// Whether the directory `name` is the sidecar of a leaf on the same level.
///
/// A category may carry a `_bin` suffix too; without its owning leaf beside
/// it, it is an ordinary directory.
fn is_sidecar(
    name: &str,
    live: Option<&[CursorEntry]>,
    committed: Option<&[CursorEntry]>,
) -> bool {
    let Some(owner) = naming::owner_of_sidecar(name) else {
        return false;
    };
    let holds_owner = |level: Option<&[CursorEntry]>| {
        level.is_some_and(|entries| entries.iter().any(|e| !e.is_tree() && e.name == owner))
    };
    holds_owner(live) || holds_owner(committed)
}

fn other_kind<'e>(
    committed: Option<&'e [CursorEntry]>,
    name: &str,
    mode: FileMode,
) -> Option<(usize, &'e CursorEntry)> {
    committed?
        .iter()
        .enumerate()
        .find(|(_, e)| e.name == name && e.is_tree() != mode.is_tree())
}

/// Report everything under a superseded stored entry as deleted.
fn deleted_below<S: ObjectStore + ?Sized>(
    prefix: &str,
    stored: Option<&StoredCursor<'_, S>>,
    idx: usize,
    entry: &CursorEntry,
    changes: &mut Vec<Change>,
) -> Result<(), WriteError> {
    let path = naming::join(prefix, &entry.name);
    if !entry.is_tree() {
        changes.push(Change::new(path, DiffType::Deleted));
        return Ok(());
    }
    let child = match stored {
        Some(s) => s.expand(idx)?,
        None => None,
    };
    diff_level::<S>(&path, None, child.as_ref(), changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Fixture {
        categories: Vec<Category>,
        descriptors: Vec<Descriptor>,
    }

    impl Dataset for Fixture {
        fn categories(&self) -> anyhow::Result<Vec<Category>> {
            Ok(self.categories.clone())
        }

        fn descriptors(
            &self,
            entity_type: EntityType,
            category: Option<i64>,
        ) -> anyhow::Result<Vec<Descriptor>> {
            Ok(self
                .descriptors
                .iter()
                .filter(|d| d.entity_type == entity_type && d.category == category)
                .cloned()
                .collect())
        }
    }

    fn category(id: i64, name: &str, parent: Option<i64>) -> Category {
        Category {
            id,
            name: name.to_string(),
            entity_type: EntityType::Process,
            parent,
        }
    }

    fn process(ref_id: &str, category: Option<i64>) -> Descriptor {
        Descriptor {
            ref_id: ref_id.to_string(),
            entity_type: EntityType::Process,
            category,
        }
    }

    #[test]
    fn category_paths_are_encoded() {
        let lookup = PathLookup::new(vec![
            category(1, "Energy", None),
            category(2, "Coal/Lignite", Some(1)),
        ]);
        assert_eq!(lookup.path_of(2), Some("process/Energy/Coal%2FLignite"));
        assert_eq!(
            lookup.path_of_descriptor(&process("p1", Some(2))),
            "process/Energy/Coal%2FLignite/p1.json"
        );
        assert_eq!(lookup.children(EntityType::Process, None), &[1]);
    }

    #[test]
    fn category_cycle_has_no_path() {
        let lookup = PathLookup::new(vec![category(1, "a", Some(2)), category(2, "b", Some(1))]);
        assert_eq!(lookup.path_of(1), None);
    }

    #[test]
    fn empty_types_are_omitted() {
        let dataset = Fixture {
            descriptors: vec![process("p1", None)],
            ..Default::default()
        };
        let lookup = paths_of_categories(&dataset).unwrap();
        let root = DatasetCursor::root(&dataset, &lookup, None).unwrap();
        let names: Vec<_> = root.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["process"]);
    }

    #[test]
    fn categories_then_entities_in_canonical_order() {
        let dataset = Fixture {
            categories: vec![category(1, "b", None)],
            descriptors: vec![process("c", None), process("a", None)],
        };
        let lookup = paths_of_categories(&dataset).unwrap();
        let root = DatasetCursor::root(&dataset, &lookup, None).unwrap();
        let level = root.expand(0).unwrap().unwrap();
        let names: Vec<_> = level.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.json", "b", "c.json"]);
        assert!(level.entries().iter().all(|e| e.oid.is_none()));
    }

    #[test]
    fn indexed_ids_are_reported() {
        let dataset = Fixture {
            descriptors: vec![process("p1", None)],
            ..Default::default()
        };
        let oid = crate::core::types::Oid::new("ab".repeat(20)).unwrap();
        let mut index = IdIndex::new();
        index.put("process/p1.json", oid.clone());

        let lookup = paths_of_categories(&dataset).unwrap();
        let root = DatasetCursor::root(&dataset, &lookup, Some(&index)).unwrap();
        assert_eq!(root.entries()[0].oid, None);
        let level = root.expand(0).unwrap().unwrap();
        assert_eq!(level.entries()[0].oid, Some(oid));
    }

    #[test]
    fn failing_dataset_maps_to_dataset_error() {
        struct Broken;
        impl Dataset for Broken {
            fn categories(&self) -> anyhow::Result<Vec<Category>> {
                anyhow::bail!("connection lost")
            }
            fn descriptors(
                &self,
                _: EntityType,
                _: Option<i64>,
            ) -> anyhow::Result<Vec<Descriptor>> {
                anyhow::bail!("connection lost")
            }
        }
        assert!(matches!(
            paths_of_categories(&Broken),
            Err(WriteError::Dataset(_))
        ));
    }
}
