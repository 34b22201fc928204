//! core::ops
//!
//! Single-writer coordination.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive repository lock
//!
//! # Architecture
//!
//! Every commit write:
//! 1. Checks repository compatibility (no writes yet)
//! 2. Acquires the exclusive repo lock
//! 3. Writes objects through one write session
//! 4. Moves the target ref
//! 5. Releases the session and then the lock, on success and on failure
//!
//! # Example
//!
//! ```ignore
//! use datagit::core::ops::lock::RepoLock;
//!
//! let lock = RepoLock::acquire(&paths)?;
//! // ... write objects, move the ref ...
//! drop(lock);
//! ```

pub mod lock;

pub use lock::{LockError, RepoLock};
