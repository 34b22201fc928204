//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! datagit has two configuration scopes:
//! - **Global**: User-level settings (committer identity, buffering)
//! - **Repo**: Repository-level overrides (default ref, force refs)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. Explicit builder calls on the writer (not handled here)
//!
//! # Example
//!
//! ```no_run
//! use datagit::core::config::Config;
//! use datagit::core::paths::DatagitPaths;
//! use std::path::PathBuf;
//!
//! let paths = DatagitPaths::new(PathBuf::from("/data/repo.git"), PathBuf::from("/data/repo.git"));
//! let config = Config::load(Some(&paths)).unwrap().config;
//! println!("Committing as {} <{}>", config.committer_name(), config.committer_email());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, RepoConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::paths::DatagitPaths;
use crate::core::types::RefName;

/// Default identity when nothing is configured.
pub const DEFAULT_COMMITTER_NAME: &str = "anonymous";
pub const DEFAULT_COMMITTER_EMAIL: &str = "anonymous@anonymous.org";

/// Default number of buffered bytes before a write session flushes.
pub const DEFAULT_BUFFER_LIMIT: usize = 1024 * 1024;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence rules automatically: repo config
/// overrides global config, which overrides defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if a repository was given)
    pub repo: Option<RepoConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `paths` is provided, also loads the repo-specific config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(paths: Option<&DatagitPaths>) -> Result<ConfigLoadResult, ConfigError> {
        let global_path = Self::find_global();
        Self::load_from(global_path.as_deref(), paths)
    }

    /// Load configuration from an explicit global file (or none).
    pub fn load_from(
        global_path: Option<&Path>,
        paths: Option<&DatagitPaths>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let global = match global_path {
            Some(path) if path.exists() => Self::read_toml::<GlobalConfig>(path)?,
            _ => GlobalConfig::default(),
        };

        let (repo, repo_path) = match paths {
            Some(paths) => {
                let path = paths.repo_config_path();
                if path.exists() {
                    (Some(Self::read_toml::<RepoConfig>(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                repo,
                global_path: global_path.filter(|p| p.exists()).map(Path::to_path_buf),
                repo_path,
            },
        })
    }

    /// Locate the global config file, if any.
    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DATAGIT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("datagit/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        let path = dirs::home_dir()?.join(".datagit/config.toml");
        path.exists().then_some(path)
    }

    fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config (`~/.datagit/config.toml`).
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".datagit/config.toml"))
    }

    /// Write repo config atomically.
    ///
    /// Creates parent directories if needed. Uses atomic write
    /// (write to temp file, then rename) to prevent corruption.
    pub fn write_repo(paths: &DatagitPaths, config: &RepoConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = paths.repo_config_path();
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    fn write_config_atomic<T: serde::Serialize>(
        path: &Path,
        config: &T,
    ) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Committer name. Defaults to `anonymous`.
    pub fn committer_name(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.committer_name.as_deref())
            .or(self.global.committer_name.as_deref())
            .unwrap_or(DEFAULT_COMMITTER_NAME)
    }

    /// Committer email. Defaults to `anonymous@anonymous.org`.
    pub fn committer_email(&self) -> &str {
        self.repo
            .as_ref()
            .and_then(|r| r.committer_email.as_deref())
            .or(self.global.committer_email.as_deref())
            .unwrap_or(DEFAULT_COMMITTER_EMAIL)
    }

    /// The ref commits advance when none is given. Defaults to `HEAD`.
    pub fn default_ref(&self) -> RefName {
        self.repo
            .as_ref()
            .and_then(|r| r.default_ref.as_deref())
            .and_then(|name| RefName::new(name).ok())
            .unwrap_or_else(RefName::head)
    }

    /// Write-session buffer size in bytes.
    pub fn buffer_limit(&self) -> usize {
        self.repo
            .as_ref()
            .and_then(|r| r.buffer_limit)
            .or(self.global.buffer_limit)
            .unwrap_or(DEFAULT_BUFFER_LIMIT)
    }

    /// Whether flushing skips objects the store already has. Defaults to `true`.
    pub fn check_existing(&self) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.check_existing)
            .unwrap_or(true)
    }

    /// Whether `name` belongs to the force-update ref class.
    ///
    /// `refs/stash` always does.
    pub fn is_force_ref(&self, name: &RefName) -> bool {
        name.is_stash()
            || self
                .repo
                .as_ref()
                .and_then(|r| r.force_refs.as_ref())
                .is_some_and(|refs| refs.iter().any(|r| r == name.as_str()))
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo_paths(temp: &TempDir) -> DatagitPaths {
        DatagitPaths::new(temp.path().to_path_buf(), temp.path().to_path_buf())
    }

    #[test]
    fn load_empty_defaults() {
        let result = Config::load_from(None, None).unwrap();
        let config = result.config;

        assert_eq!(config.committer_name(), DEFAULT_COMMITTER_NAME);
        assert_eq!(config.committer_email(), DEFAULT_COMMITTER_EMAIL);
        assert!(config.default_ref().is_head());
        assert_eq!(config.buffer_limit(), DEFAULT_BUFFER_LIMIT);
        assert!(config.check_existing());
        assert!(config.is_force_ref(&RefName::stash()));
        assert!(!config.is_force_ref(&RefName::head()));
    }

    #[test]
    fn load_global_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
            committer_name = "Jane"
            buffer_limit = 2048
            "#,
        )
        .unwrap();

        let config = Config::load_from(Some(&config_path), None).unwrap().config;

        assert_eq!(config.committer_name(), "Jane");
        assert_eq!(config.buffer_limit(), 2048);
        assert_eq!(config.global_config_loaded_from(), Some(config_path.as_path()));
    }

    #[test]
    fn load_repo_config() {
        let temp = TempDir::new().unwrap();
        let paths = repo_paths(&temp);
        paths.ensure_dirs().unwrap();
        fs::write(
            paths.repo_config_path(),
            r#"
            default_ref = "refs/heads/main"
            force_refs = ["refs/snapshots/auto"]
            check_existing = false
            "#,
        )
        .unwrap();

        let config = Config::load_from(None, Some(&paths)).unwrap().config;

        assert_eq!(config.default_ref().as_str(), "refs/heads/main");
        assert!(config.is_force_ref(&RefName::new("refs/snapshots/auto").unwrap()));
        assert!(!config.check_existing());
    }

    #[test]
    fn repo_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("global.toml");
        fs::write(&global, "committer_name = \"Global\"\nbuffer_limit = 10").unwrap();

        let paths = repo_paths(&temp);
        Config::write_repo(
            &paths,
            &RepoConfig {
                committer_name: Some("Repo".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let config = Config::load_from(Some(&global), Some(&paths)).unwrap().config;
        assert_eq!(config.committer_name(), "Repo");
        assert_eq!(config.buffer_limit(), 10);
    }

    #[test]
    fn invalid_repo_value_rejected() {
        let temp = TempDir::new().unwrap();
        let paths = repo_paths(&temp);
        paths.ensure_dirs().unwrap();
        fs::write(paths.repo_config_path(), "buffer_limit = 0").unwrap();

        assert!(Config::load_from(None, Some(&paths)).is_err());
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let paths = repo_paths(&temp);
        paths.ensure_dirs().unwrap();
        fs::write(paths.repo_config_path(), "unknown_field = true").unwrap();

        let result = Config::load_from(None, Some(&paths));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
