//! sync::hooks
//!
//! Collaborator interfaces consumed during a synchronization.
//!
//! - [`DataProducer`] - serialized bytes of a changed entity
//! - [`BinaryResolver`] - bytes of one sidecar file
//! - [`CommitHooks`] - insertion/removal notifications (default no-op)
//! - [`ProgressMonitor`] - progress side channel (default no-op)
//! - [`CancelFlag`] - cooperative cancellation
//!
//! Producers and resolvers are implemented for plain closures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::model::Change;
use crate::core::types::Oid;

/// Supplies the blob payload of a data change.
pub trait DataProducer {
    fn serialize(&self, change: &Change) -> anyhow::Result<Vec<u8>>;
}

impl<F> DataProducer for F
where
    F: Fn(&Change) -> anyhow::Result<Vec<u8>>,
{
    fn serialize(&self, change: &Change) -> anyhow::Result<Vec<u8>> {
        self(change)
    }
}

/// Supplies the content of a sidecar file. `file` is relative to the sidecar.
pub trait BinaryResolver {
    fn resolve(&self, change: &Change, file: &str) -> anyhow::Result<Vec<u8>>;
}

impl<F> BinaryResolver for F
where
    F: Fn(&Change, &str) -> anyhow::Result<Vec<u8>>,
{
    fn resolve(&self, change: &Change, file: &str) -> anyhow::Result<Vec<u8>> {
        self(change, file)
    }
}

/// Resolver for change sets without binaries; any request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBinaries;

impl BinaryResolver for NoBinaries {
    fn resolve(&self, change: &Change, file: &str) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("no binary resolver configured for {} ({file})", change.path)
    }
}

/// Notifications about objects entering or leaving the new tree.
pub trait CommitHooks {
    /// A new blob or tree was written for `path` (`""` is the root).
    fn on_inserted(&mut self, _path: &str, _oid: &Oid) {}

    /// `path` and everything below it is gone from the new tree.
    fn on_removed(&mut self, _path: &str) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl CommitHooks for NoHooks {}

impl<T: CommitHooks + ?Sized> CommitHooks for &mut T {
    fn on_inserted(&mut self, path: &str, oid: &Oid) {
        (**self).on_inserted(path, oid)
    }

    fn on_removed(&mut self, path: &str) {
        (**self).on_removed(path)
    }
}

/// Progress side channel. Called synchronously; must not block.
pub trait ProgressMonitor {
    fn sub_task(&mut self, _label: &str, _change: &Change) {}

    fn worked(&mut self, _amount: usize) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressMonitor for NoProgress {}

impl<T: ProgressMonitor + ?Sized> ProgressMonitor for &mut T {
    fn sub_task(&mut self, label: &str, change: &Change) {
        (**self).sub_task(label, change)
    }

    fn worked(&mut self, amount: usize) {
        (**self).worked(amount)
    }
}

/// Shared cancellation flag, checked between top-level entries.
///
/// ```
/// use datagit::sync::CancelFlag;
///
/// let flag = CancelFlag::new();
/// let handle = flag.clone();
/// handle.cancel();
/// assert!(flag.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::DiffType;

    #[test]
    fn closures_are_producers() {
        let producer = |c: &Change| -> anyhow::Result<Vec<u8>> { Ok(c.path.as_bytes().to_vec()) };
        let change = Change::new("flow/f.json", DiffType::Added);
        assert_eq!(producer.serialize(&change).unwrap(), b"flow/f.json");
    }

    #[test]
    fn no_binaries_fails() {
        let change = Change::new("flow/f.json", DiffType::Added);
        let err = NoBinaries.resolve(&change, "a.png").unwrap_err();
        assert!(err.to_string().contains("flow/f.json"));
    }

    #[test]
    fn hooks_through_mutable_reference() {
        #[derive(Default)]
        struct Count(usize);
        impl CommitHooks for Count {
            fn on_removed(&mut self, _path: &str) {
                self.0 += 1;
            }
        }

        let mut count = Count::default();
        {
            let mut hooks: Box<dyn CommitHooks + '_> = Box::new(&mut count);
            hooks.on_removed("x");
            hooks.on_removed("y");
        }
        assert_eq!(count.0, 2);
    }
}
