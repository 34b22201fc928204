//! Property-based tests for content addressing and tree synchronization.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated change sets.

use std::collections::BTreeSet;

use proptest::prelude::*;

use datagit::core::model::{Change, DiffType};
use datagit::core::types::Oid;
use datagit::store::{read_tree, MemoryStore, ObjectStore};
use datagit::sync::NoBinaries;
use datagit::writer::{commit_info, CommitWriter};

fn producer(change: &Change) -> anyhow::Result<Vec<u8>> {
    Ok(format!("{{\"path\":\"{}\"}}", change.path).into_bytes())
}

/// Strategy for dataset leaf paths: `<type>/<category>*/<leaf>.json`.
fn leaf_path() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("process"), Just("flow"), Just("actor")],
        prop::collection::vec("[a-c]{1,3}", 0..3),
        "[a-z]{1,4}",
    )
        .prop_map(|(folder, categories, leaf)| {
            let mut path = folder.to_string();
            for category in categories {
                path.push('/');
                path.push_str(&category);
            }
            format!("{path}/{leaf}.json")
        })
}

/// Strategy for sets of distinct leaf paths.
fn leaf_paths() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(leaf_path(), 0..12).prop_map(|set: BTreeSet<String>| {
        set.into_iter().collect()
    })
}

fn root_tree(store: &MemoryStore, changes: &[Change], parents: &[Oid]) -> (Oid, Oid) {
    let commit = CommitWriter::new(store, &producer, &NoBinaries)
        .write("test", changes, parents)
        .unwrap();
    let tree = commit_info(store, &commit).unwrap().tree;
    (commit, tree)
}

fn additions(paths: &[String]) -> Vec<Change> {
    paths
        .iter()
        .map(|p| Change::new(p.as_str(), DiffType::Added))
        .collect()
}

proptest! {
    /// The order of a change set never affects the resulting tree.
    #[test]
    fn change_order_does_not_matter(paths in leaf_paths(), seed in any::<u64>()) {
        let forward = additions(&paths);
        let mut shuffled = forward.clone();
        // Deterministic rotation plus reversal derived from the seed.
        if !shuffled.is_empty() {
            let k = (seed as usize) % shuffled.len();
            shuffled.rotate_left(k);
            if seed % 2 == 0 {
                shuffled.reverse();
            }
        }

        let (_, a) = root_tree(&MemoryStore::new(), &forward, &[]);
        let (_, b) = root_tree(&MemoryStore::new(), &shuffled, &[]);
        prop_assert_eq!(a, b);
    }

    /// Synchronizing nothing against a parent reproduces the parent tree.
    #[test]
    fn empty_change_set_is_idempotent(paths in leaf_paths()) {
        let store = MemoryStore::new();
        let (first, tree) = root_tree(&store, &additions(&paths), &[]);
        let objects = store.object_count();

        let (_, again) = root_tree(&store, &[], &[first]);
        prop_assert_eq!(again, tree);
        // Only the new commit object is added.
        prop_assert_eq!(store.object_count(), objects + 1);
    }

    /// Deleting every leaf leaves only the repository info file.
    #[test]
    fn deleting_everything_prunes_to_info(paths in leaf_paths()) {
        let store = MemoryStore::new();
        let (first, _) = root_tree(&store, &additions(&paths), &[]);
        let deletions: Vec<Change> = paths
            .iter()
            .map(|p| Change::new(p.as_str(), DiffType::Deleted))
            .collect();

        let (_, tree) = root_tree(&store, &deletions, &[first]);
        let names: Vec<String> = read_tree(&store, &tree)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        prop_assert_eq!(names, vec!["repository.json".to_string()]);
    }

    /// Every written leaf is reachable at its path with the producer's bytes.
    #[test]
    fn every_leaf_is_stored_at_its_path(paths in leaf_paths()) {
        let store = MemoryStore::new();
        let (_, tree) = root_tree(&store, &additions(&paths), &[]);
        for path in &paths {
            let entry = datagit::store::find_path(&store, &tree, path).unwrap();
            prop_assert!(entry.is_some(), "missing {}", path);
            let (_, data) = store.read_object(&entry.unwrap().oid).unwrap();
            prop_assert_eq!(data, producer(&Change::new(path.as_str(), DiffType::Added)).unwrap());
        }
    }
}
