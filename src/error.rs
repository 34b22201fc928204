//! error
//!
//! The error returned by commit writing and synchronization.
//!
//! Every variant aborts the whole write: the target ref is left where it
//! was and no new object becomes reachable from any ref.

use thiserror::Error;

use crate::core::info::InfoError;
use crate::core::ops::LockError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum WriteError {
    /// Object read/write failure or a corrupt object.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The repository was written by a newer, unsupported writer.
    #[error("repository schema version {found} is newer than supported version {supported}")]
    Incompatible { found: u32, supported: u32 },

    /// A data producer or binary resolver failed for one entry.
    #[error("failed to produce content for {path}: {message}")]
    Serialization { path: String, message: String },

    /// The live dataset could not be enumerated.
    #[error("dataset query failed: {0}")]
    Dataset(String),

    #[error("commit was cancelled")]
    Cancelled,

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Info(InfoError),
}

impl From<InfoError> for WriteError {
    fn from(err: InfoError) -> Self {
        match err {
            InfoError::Incompatible { found, supported } => {
                WriteError::Incompatible { found, supported }
            }
            other => WriteError::Info(other),
        }
    }
}

impl WriteError {
    pub(crate) fn serialization(path: &str, err: &anyhow::Error) -> Self {
        WriteError::Serialization {
            path: path.to_string(),
            message: format!("{err:#}"),
        }
    }

    /// True for failures of the underlying store.
    pub fn is_store_error(&self) -> bool {
        matches!(self, WriteError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incompatible_info_maps_to_incompatible() {
        let err: WriteError = InfoError::Incompatible {
            found: 3,
            supported: 2,
        }
        .into();
        assert!(matches!(
            err,
            WriteError::Incompatible {
                found: 3,
                supported: 2
            }
        ));
    }

    #[test]
    fn serialization_keeps_context_chain() {
        let err = anyhow::anyhow!("disk full").context("reading process");
        let err = WriteError::serialization("process/p.json", &err);
        let text = err.to_string();
        assert!(text.contains("process/p.json"));
        assert!(text.contains("reading process: disk full"));
    }

    #[test]
    fn converts_into_anyhow() {
        let err: anyhow::Error = WriteError::Cancelled.into();
        assert_eq!(err.to_string(), "commit was cancelled");
    }
}
