//! sync::index
//!
//! Persisted map from dataset path to the object id last written for it.
//!
//! The index answers "is there a stored id for this exact content" for the
//! dataset cursor, so unchanged entries never need re-serializing. It stays
//! current by acting as the [`CommitHooks`] of a commit and is saved
//! atomically afterwards.
//!
//! # Example
//!
//! ```ignore
//! let mut index = IdIndex::load(&paths)?;
//! let commit = CommitWriter::new(&store, &producer, &resolver)
//!     .hooks(&mut index)
//!     .write("update", &changes, &[parent])?;
//! index.save()?;
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hooks::CommitHooks;
use crate::core::paths::DatagitPaths;
use crate::core::types::Oid;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read id index '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse id index '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write id index '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("id index has no file to save to")]
    NoFile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdIndex {
    ids: BTreeMap<String, Oid>,
    #[serde(skip)]
    file: Option<PathBuf>,
}

impl IdIndex {
    /// An empty index that is not backed by a file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index of a repository; a missing file gives an empty index.
    pub fn load(paths: &DatagitPaths) -> Result<Self, IndexError> {
        Self::load_from(&paths.id_index_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, IndexError> {
        let mut index = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|e| IndexError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })?;
            serde_json::from_str::<IdIndex>(&contents).map_err(|e| IndexError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            Self::default()
        };
        index.file = Some(path.to_path_buf());
        Ok(index)
    }

    /// Save to the file the index was loaded from.
    pub fn save(&self) -> Result<(), IndexError> {
        let path = self.file.as_deref().ok_or(IndexError::NoFile)?;
        self.save_to(path)
    }

    /// Write atomically (temp file, then rename).
    pub fn save_to(&self, path: &Path) -> Result<(), IndexError> {
        let write_err = |path: &Path, e: std::io::Error| IndexError::WriteError {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(path, e))?;
        }
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            write_err(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| write_err(&temp_path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| write_err(&temp_path, e))?;
        file.sync_all().map_err(|e| write_err(&temp_path, e))?;
        fs::rename(&temp_path, path).map_err(|e| write_err(path, e))?;
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Oid> {
        self.ids.get(path)
    }

    pub fn has(&self, path: &str) -> bool {
        self.ids.contains_key(path)
    }

    pub fn put(&mut self, path: impl Into<String>, oid: Oid) {
        self.ids.insert(path.into(), oid);
    }

    /// Forget `path` and every path below it.
    pub fn remove(&mut self, path: &str) {
        let prefix = format!("{path}/");
        self.ids
            .retain(|key, _| key != path && !key.starts_with(&prefix));
    }

    /// Mark `path` as edited: forget it and every tree containing it.
    ///
    /// Call this when a dataset entry changes so that a diff descends to it.
    pub fn invalidate(&mut self, path: &str) {
        self.ids.remove(path);
        let mut rest = path;
        while let Some((parent, _)) = rest.rsplit_once('/') {
            self.ids.remove(parent);
            rest = parent;
        }
        self.ids.remove("");
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl CommitHooks for IdIndex {
    fn on_inserted(&mut self, path: &str, oid: &Oid) {
        self.put(path, oid.clone());
    }

    fn on_removed(&mut self, path: &str) {
        self.remove(path);
    }
}
