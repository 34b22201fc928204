//! datagit - versioning a hierarchical dataset in a git object store
//!
//! A dataset of entities grouped by entity type and nested categories is
//! stored as blobs and trees. A pending change set is merged with N parent
//! commits path by path: unchanged subtrees are reused by id, changed
//! entries are serialized by a caller-supplied producer, and a named ref is
//! advanced to the resulting commit.
//!
//! # Architecture
//!
//! The codebase is layered, leaves first:
//!
//! - [`core`] - Domain types, path rules, repository info, config and locking
//! - [`git`] - Single interface to git repositories on disk
//! - [`store`] - Object stores (git-backed and in-memory) and write sessions
//! - [`sync`] - Enumerators and the tree synchronizer
//! - [`writer`] - Commit building and ref updates
//!
//! # Correctness Invariants
//!
//! 1. Equal content always yields equal object ids
//! 2. A failed or cancelled write never moves a ref
//! 3. The root tree always exists and carries the repository info file
//! 4. A sidecar never outlives the leaf that owns it

pub mod core;
pub mod error;
pub mod git;
pub mod store;
pub mod sync;
pub mod writer;

pub use crate::core::model::{Change, DiffType, EntityType, LibraryLink};
pub use crate::core::types::{Oid, RefName};
pub use error::WriteError;
pub use writer::CommitWriter;
