//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$DATAGIT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/datagit/config.toml`
//! 3. `~/.datagit/config.toml` (canonical write location)
//!
//! # Repo Config
//!
//! Located at `<common_dir>/datagit/config.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., ref names must be valid, buffer limits positive).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::RefName;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// committer_name = "Jane Doe"
/// committer_email = "jane@example.org"
/// buffer_limit = 4194304
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Name recorded as author and committer
    pub committer_name: Option<String>,

    /// Email recorded as author and committer
    pub committer_email: Option<String>,

    /// Bytes buffered by a write session before it flushes
    pub buffer_limit: Option<usize>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_identity(self.committer_name.as_deref(), self.committer_email.as_deref())?;
        validate_buffer_limit(self.buffer_limit)
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// default_ref = "refs/heads/main"
/// force_refs = ["refs/snapshots/auto"]
/// check_existing = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Ref advanced by commits when none is given (default: HEAD)
    pub default_ref: Option<String>,

    /// Refs that always force-move and always append a reflog entry
    pub force_refs: Option<Vec<String>>,

    /// Skip writing objects the store already holds
    pub check_existing: Option<bool>,

    /// Overrides the global buffer limit
    pub buffer_limit: Option<usize>,

    /// Overrides the global committer name
    pub committer_name: Option<String>,

    /// Overrides the global committer email
    pub committer_email: Option<String>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.default_ref {
            RefName::new(name.as_str())
                .map_err(|e| ConfigError::InvalidValue(format!("invalid default_ref: {e}")))?;
        }

        for name in self.force_refs.iter().flatten() {
            RefName::new(name.as_str())
                .map_err(|e| ConfigError::InvalidValue(format!("invalid force ref: {e}")))?;
        }

        validate_identity(self.committer_name.as_deref(), self.committer_email.as_deref())?;
        validate_buffer_limit(self.buffer_limit)
    }
}

fn validate_identity(name: Option<&str>, email: Option<&str>) -> Result<(), ConfigError> {
    if let Some(name) = name {
        if name.trim().is_empty() || name.contains(['<', '>', '\n']) {
            return Err(ConfigError::InvalidValue(format!(
                "invalid committer name '{name}'"
            )));
        }
    }
    if let Some(email) = email {
        if email.contains(['<', '>', '\n']) {
            return Err(ConfigError::InvalidValue(format!(
                "invalid committer email '{email}'"
            )));
        }
    }
    Ok(())
}

fn validate_buffer_limit(limit: Option<usize>) -> Result<(), ConfigError> {
    if limit == Some(0) {
        return Err(ConfigError::InvalidValue(
            "buffer_limit must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = GlobalConfig::default();
            assert!(config.committer_name.is_none());
            assert!(config.buffer_limit.is_none());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn zero_buffer_rejected() {
            let config = GlobalConfig {
                buffer_limit: Some(0),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn angle_brackets_in_name_rejected() {
            let config = GlobalConfig {
                committer_name: Some("Eve <evil>".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn roundtrip() {
            let config = GlobalConfig {
                committer_name: Some("Jane".to_string()),
                committer_email: Some("jane@example.org".to_string()),
                buffer_limit: Some(1024),
            };

            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: GlobalConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }
    }

    mod repo_config {
        use super::*;

        #[test]
        fn valid_refs() {
            let config = RepoConfig {
                default_ref: Some("refs/heads/main".to_string()),
                force_refs: Some(vec!["refs/snapshots/auto".to_string()]),
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }

        #[test]
        fn invalid_default_ref() {
            let config = RepoConfig {
                default_ref: Some("refs/heads/a..b".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn invalid_force_ref() {
            let config = RepoConfig {
                force_refs: Some(vec!["bad ref".to_string()]),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn reject_unknown_fields() {
            let toml = r#"
                default_ref = "HEAD"
                unknown_field = true
            "#;

            let result: Result<RepoConfig, _> = toml::from_str(toml);
            assert!(result.is_err());
        }
    }
}
