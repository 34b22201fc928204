//! store::session
//!
//! Buffered, exclusively owned object inserter for one commit operation.
//!
//! # Lifecycle
//!
//! ```text
//! WriteSession::new ──put_*──▶ (buffer) ──flush at limit──▶ store
//!        │                                                    ▲
//!        └── finish() ──────── final flush ───────────────────┘
//!        └── drop without finish ── best-effort flush, warn on failure
//! ```
//!
//! Ids are computed when an object is put, so callers get them immediately.
//! Objects of an aborted session may reach the store but are never referenced
//! by a ref.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::object::{encode_tree, CommitRecord, TreeEntry};
use super::{ObjectStore, StoreError};
use crate::core::types::{ObjectKind, Oid};

struct Pending {
    kind: ObjectKind,
    oid: Oid,
    data: Vec<u8>,
}

/// A write session over a store.
///
/// # Example
///
/// ```
/// use datagit::store::{MemoryStore, WriteSession, ObjectStore};
///
/// let store = MemoryStore::new();
/// let mut session = WriteSession::new(&store, 1024, true);
/// let id = session.put_blob(b"hello").unwrap();
/// assert!(!store.contains(&id).unwrap());
/// session.finish().unwrap();
/// assert!(store.contains(&id).unwrap());
/// ```
pub struct WriteSession<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    pending: Vec<Pending>,
    pending_bytes: usize,
    /// Every id put during this session, flushed or not.
    seen: HashSet<Oid>,
    buffer_limit: usize,
    check_existing: bool,
    written: usize,
    closed: bool,
}

impl<'s, S: ObjectStore + ?Sized> WriteSession<'s, S> {
    /// Open a session that flushes once `buffer_limit` bytes are pending.
    ///
    /// With `check_existing`, flushing skips objects the store already holds.
    pub fn new(store: &'s S, buffer_limit: usize, check_existing: bool) -> Self {
        Self {
            store,
            pending: Vec::new(),
            pending_bytes: 0,
            seen: HashSet::new(),
            buffer_limit: buffer_limit.max(1),
            check_existing,
            written: 0,
            closed: false,
        }
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    pub fn put_blob(&mut self, data: &[u8]) -> Result<Oid, StoreError> {
        self.put(ObjectKind::Blob, data.to_vec())
    }

    /// Encode and put a tree. Entry order does not matter.
    pub fn put_tree(&mut self, entries: Vec<TreeEntry>) -> Result<Oid, StoreError> {
        let data = encode_tree(entries)?;
        self.put(ObjectKind::Tree, data)
    }

    pub fn put_commit(&mut self, commit: &CommitRecord) -> Result<Oid, StoreError> {
        self.put(ObjectKind::Commit, commit.encode())
    }

    /// Put a raw object, returning its id. Repeated content is buffered once.
    pub fn put(&mut self, kind: ObjectKind, data: Vec<u8>) -> Result<Oid, StoreError> {
        if self.closed {
            return Err(StoreError::Io("write session is closed".to_string()));
        }

        let oid = self.store.hash_object(kind, &data)?;
        if !self.seen.insert(oid.clone()) {
            return Ok(oid);
        }

        self.pending_bytes += data.len();
        self.pending.push(Pending {
            kind,
            oid: oid.clone(),
            data,
        });

        if self.pending_bytes >= self.buffer_limit {
            self.flush()?;
        }
        Ok(oid)
    }

    /// Write all pending objects to the store.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let pending = std::mem::take(&mut self.pending);
        self.pending_bytes = 0;
        let count = pending.len();

        for object in pending {
            if self.check_existing && self.store.contains(&object.oid)? {
                continue;
            }
            let written = self.store.write_object(object.kind, &object.data)?;
            if written != object.oid {
                return Err(StoreError::Corrupt {
                    oid: object.oid.to_string(),
                    message: format!(
                        "store wrote {} under a different id {}",
                        object.kind, written
                    ),
                });
            }
            self.written += 1;
        }

        if count > 0 {
            debug!(objects = count, "flushed write session");
        }
        Ok(())
    }

    /// Flush and close the session, returning the number of objects written.
    pub fn finish(mut self) -> Result<usize, StoreError> {
        self.flush()?;
        self.closed = true;
        Ok(self.written)
    }

    /// Number of objects waiting for a flush.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl<S: ObjectStore + ?Sized> Drop for WriteSession<'_, S> {
    fn drop(&mut self) {
        if self.closed || self.pending.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to flush write session on release");
        }
    }
}

impl<S: ObjectStore + ?Sized> std::fmt::Debug for WriteSession<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteSession")
            .field("pending", &self.pending.len())
            .field("pending_bytes", &self.pending_bytes)
            .field("written", &self.written)
            .field("closed", &self.closed)
            .finish()
    }
}
