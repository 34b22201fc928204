//! sync
//!
//! Tree synchronization: walking a change set against parent trees and
//! writing the resulting tree.
//!
//! # Modules
//!
//! - [`cursor`] - The level-wise cursor abstraction shared by all sources
//! - [`changes`] - Cursor over a pending change set, with sidecar coupling
//! - [`stored`] - Cursor over a committed tree
//! - [`dataset`] - Cursor over the live dataset, and diffing it against a tree
//! - [`walk`] - Lock-step merge of one change level and N parent levels
//! - [`synchronizer`] - Builds the new tree from a merged walk
//! - [`hooks`] - Producers, resolvers, hooks, progress and cancellation
//! - [`index`] - Persisted path-to-id index kept current through hooks

pub mod changes;
pub mod cursor;
pub mod dataset;
pub mod hooks;
pub mod index;
pub mod stored;
pub mod synchronizer;
pub mod walk;

pub use changes::{ChangeCursor, ChangeSlot};
pub use cursor::{CursorEntry, TreeCursor};
pub use dataset::{
    diff_dataset, paths_of_categories, Category, Dataset, DatasetCursor, Descriptor, PathLookup,
};
pub use hooks::{
    BinaryResolver, CancelFlag, CommitHooks, DataProducer, NoBinaries, NoHooks, NoProgress,
    ProgressMonitor,
};
pub use index::{IdIndex, IndexError};
pub use stored::StoredCursor;
pub use synchronizer::{Synchronizer, WRITING_TASK};
pub use walk::{MergedRow, MergedWalk};
