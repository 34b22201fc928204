//! store::memory
//!
//! In-process object store.
//!
//! Ids are SHA-256 over the git object header `"<kind> <len>\0"` followed by
//! the content. `HEAD` is a symbolic ref to `refs/heads/main`, and every ref
//! update is logged.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use sha2::{Digest, Sha256};

use super::{ObjectStore, RefUpdate, ReflogEntry, StoreError};
use crate::core::types::{ObjectKind, Oid, RefName};

const HEAD_TARGET: &str = "refs/heads/main";

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<Oid, (ObjectKind, Vec<u8>)>>,
    refs: Mutex<HashMap<String, Oid>>,
    reflogs: Mutex<HashMap<String, Vec<ReflogEntry>>>,
    writes: AtomicUsize,
}

fn guard<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Io("memory store lock poisoned".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects held.
    pub fn object_count(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    /// Number of `write_object` calls that stored a new object.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn direct_name(name: &RefName) -> String {
        if name.is_head() {
            HEAD_TARGET.to_string()
        } else {
            name.as_str().to_string()
        }
    }
}

impl ObjectStore for MemoryStore {
    fn hash_object(&self, kind: ObjectKind, data: &[u8]) -> Result<Oid, StoreError> {
        let mut hasher = Sha256::new();
        hasher.update(format!("{} {}\0", kind.as_str(), data.len()).as_bytes());
        hasher.update(data);
        Ok(Oid::new(hex::encode(hasher.finalize()))?)
    }

    fn contains(&self, oid: &Oid) -> Result<bool, StoreError> {
        Ok(guard(&self.objects)?.contains_key(oid))
    }

    fn read_object(&self, oid: &Oid) -> Result<(ObjectKind, Vec<u8>), StoreError> {
        guard(&self.objects)?
            .get(oid)
            .cloned()
            .ok_or_else(|| StoreError::Corrupt {
                oid: oid.to_string(),
                message: "object not found".to_string(),
            })
    }

    fn write_object(&self, kind: ObjectKind, data: &[u8]) -> Result<Oid, StoreError> {
        let oid = self.hash_object(kind, data)?;
        let mut objects = guard(&self.objects)?;
        if !objects.contains_key(&oid) {
            objects.insert(oid.clone(), (kind, data.to_vec()));
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(oid)
    }

    fn resolve_ref(&self, name: &RefName) -> Result<Option<Oid>, StoreError> {
        Ok(guard(&self.refs)?.get(&Self::direct_name(name)).cloned())
    }

    fn update_ref(&self, update: &RefUpdate) -> Result<(), StoreError> {
        let direct = Self::direct_name(&update.name);
        let mut refs = guard(&self.refs)?;
        let current = refs.get(&direct).cloned();

        if let Some(expected) = &update.expected_old {
            if *expected != current {
                return Err(StoreError::RefRejected {
                    refname: direct,
                    message: format!(
                        "expected {}, found {}",
                        expected.as_ref().map_or("<none>".to_string(), Oid::to_string),
                        current.as_ref().map_or("<none>".to_string(), Oid::to_string)
                    ),
                });
            }
        }

        refs.insert(direct.clone(), update.new.clone());
        guard(&self.reflogs)?
            .entry(direct)
            .or_default()
            .insert(
                0,
                ReflogEntry {
                    old: current,
                    new: update.new.clone(),
                    committer_name: update.committer.name.clone(),
                    committer_email: update.committer.email.clone(),
                    message: update.message.clone(),
                },
            );
        Ok(())
    }

    fn reflog(&self, name: &RefName) -> Result<Vec<ReflogEntry>, StoreError> {
        Ok(guard(&self.reflogs)?
            .get(&Self::direct_name(name))
            .cloned()
            .unwrap_or_default())
    }

    fn id_len(&self) -> usize {
        32
    }
}
