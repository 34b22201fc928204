//! core::info
//!
//! The repository info record stored as `repository.json` in every root tree.
//!
//! # Schema Design
//!
//! The record is small and self-describing:
//! - `schemaVersion` gates which writers may add commits to the repository
//! - `libraries` lists the declared library links in the order supplied
//!
//! Parsing dispatches on `schemaVersion` first, so a record written by a newer
//! writer is reported as incompatible instead of failing on unknown fields.
//!
//! # Example
//!
//! ```
//! use datagit::core::info::{parse_info, RepositoryInfo, REPOSITORY_SCHEMA_VERSION};
//! use datagit::core::model::LibraryLink;
//!
//! let info = RepositoryInfo::current().with_libraries(vec![LibraryLink::new("ecoinvent", "3.9")]);
//! let json = info.to_json().unwrap();
//! let parsed = parse_info(&json).unwrap();
//! assert_eq!(parsed.schema_version, REPOSITORY_SCHEMA_VERSION);
//! assert_eq!(parsed.libraries[0].name, "ecoinvent");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::LibraryLink;

/// Highest repository schema version this writer understands.
pub const REPOSITORY_SCHEMA_VERSION: u32 = 2;

/// Version assumed for commits that carry no readable info file.
pub const LEGACY_SCHEMA_VERSION: u32 = 1;

/// Errors from repository info handling.
#[derive(Debug, Error)]
pub enum InfoError {
    #[error("failed to parse repository info: {0}")]
    ParseError(String),

    #[error("failed to serialize repository info: {0}")]
    SerializeError(String),

    #[error("repository schema version {found} is newer than supported version {supported}")]
    Incompatible { found: u32, supported: u32 },
}

/// Envelope used to read the version before the full record.
#[derive(Debug, Deserialize)]
struct InfoEnvelope {
    #[serde(rename = "schemaVersion", default = "legacy_version")]
    schema_version: u32,
}

fn legacy_version() -> u32 {
    LEGACY_SCHEMA_VERSION
}

/// Repository metadata written at a fixed path in each root tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    pub schema_version: u32,
    #[serde(default)]
    pub libraries: Vec<LibraryLink>,
}

impl RepositoryInfo {
    /// Info for the schema version this writer produces.
    pub fn current() -> Self {
        Self {
            schema_version: REPOSITORY_SCHEMA_VERSION,
            libraries: Vec::new(),
        }
    }

    pub fn with_libraries(mut self, libraries: Vec<LibraryLink>) -> Self {
        self.libraries = libraries;
        self
    }

    /// Serialize to the canonical JSON stored in the object store.
    pub fn to_json(&self) -> Result<String, InfoError> {
        serde_json::to_string(self).map_err(|e| InfoError::SerializeError(e.to_string()))
    }

    /// Fail if this record was written by a newer, unsupported writer.
    pub fn check_compatible(&self) -> Result<(), InfoError> {
        check_version(self.schema_version)
    }
}

/// Fail if `version` is newer than [`REPOSITORY_SCHEMA_VERSION`].
pub fn check_version(version: u32) -> Result<(), InfoError> {
    if version > REPOSITORY_SCHEMA_VERSION {
        return Err(InfoError::Incompatible {
            found: version,
            supported: REPOSITORY_SCHEMA_VERSION,
        });
    }
    Ok(())
}

/// Parse repository info JSON with version dispatch.
///
/// # Errors
///
/// - [`InfoError::ParseError`] if the JSON is malformed
/// - [`InfoError::Incompatible`] if the schema version is newer than supported
pub fn parse_info(json: &str) -> Result<RepositoryInfo, InfoError> {
    let envelope: InfoEnvelope =
        serde_json::from_str(json).map_err(|e| InfoError::ParseError(e.to_string()))?;
    check_version(envelope.schema_version)?;

    let mut info: RepositoryInfo = match serde_json::from_str(json) {
        Ok(info) => info,
        // Legacy records may lack schemaVersion entirely.
        Err(_) => {
            #[derive(Deserialize)]
            struct Legacy {
                #[serde(default)]
                libraries: Vec<LibraryLink>,
            }
            let legacy: Legacy =
                serde_json::from_str(json).map_err(|e| InfoError::ParseError(e.to_string()))?;
            RepositoryInfo {
                schema_version: envelope.schema_version,
                libraries: legacy.libraries,
            }
        }
    };
    info.schema_version = envelope.schema_version;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_uses_camel_case() {
        let json = RepositoryInfo::current().to_json().unwrap();
        assert_eq!(json, r#"{"schemaVersion":2,"libraries":[]}"#);
    }

    #[test]
    fn library_order_is_preserved() {
        let info = RepositoryInfo::current().with_libraries(vec![
            LibraryLink::new("z", "1"),
            LibraryLink::new("a", "2"),
        ]);
        let parsed = parse_info(&info.to_json().unwrap()).unwrap();
        assert_eq!(parsed.libraries[0].name, "z");
        assert_eq!(parsed.libraries[1].name, "a");
    }

    #[test]
    fn newer_version_is_incompatible() {
        let err = parse_info(r#"{"schemaVersion":99,"libraries":[],"extra":true}"#).unwrap_err();
        assert!(matches!(
            err,
            InfoError::Incompatible {
                found: 99,
                supported: REPOSITORY_SCHEMA_VERSION
            }
        ));
    }

    #[test]
    fn missing_version_is_legacy() {
        let info = parse_info(r#"{"libraries":[{"name":"x","version":"1"}]}"#).unwrap();
        assert_eq!(info.schema_version, LEGACY_SCHEMA_VERSION);
        assert_eq!(info.libraries.len(), 1);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(parse_info("{"), Err(InfoError::ParseError(_))));
    }

    #[test]
    fn check_current_version_passes() {
        assert!(RepositoryInfo::current().check_compatible().is_ok());
    }
}
