//! core
//!
//! Core domain types, schemas, and operations for datagit.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Oid, RefName, ObjectKind
//! - [`model`] - Dataset-side types: EntityType, Change, LibraryLink
//! - [`naming`] - Dataset path conventions and the sidecar naming rules
//! - [`info`] - The repository info record written into every root tree
//! - [`ops`] - Single-writer locking
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for datagit storage
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Path rules live in one place

pub mod config;
pub mod info;
pub mod model;
pub mod naming;
pub mod ops;
pub mod paths;
pub mod types;
