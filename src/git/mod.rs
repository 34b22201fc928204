//! git
//!
//! Single interface for all libgit2 operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to libgit2. No other module imports
//! `git2`. The [`GitStore`](crate::store::GitStore) adapter builds the
//! object-store contract on top of it.
//!
//! # Responsibilities
//!
//! - Repository discovery, opening and bare initialisation
//! - Raw object database access (hash, write, read, exists)
//! - Ref operations (symbolic resolution, CAS update)
//! - Reflog listing and appending
//!
//! # Invariants
//!
//! - No other module calls git2 directly
//! - All operations return strong types (Oid, ObjectKind)

mod interface;

pub use interface::{Git, GitError, ReflogRecord, RepoInfo};
