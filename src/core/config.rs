//! core::config
//!
//! Configuration schema and loading.
//!
//! Two scopes, later overrides earlier:
//!
//! 1. Default values
//! 2. User config: `$XDG_CONFIG_HOME/gitweave/config.toml` (or the platform
//!    equivalent via `dirs`)
//! 3. Repo config: `.git/gitweave/config.toml`
//!
//! CLI flags are applied on top by the command layer and are not handled
//! here.
//!
//! # Example
//!
//! ```toml
//! remote = "origin"
//! fetch = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Configuration file schema. Both scopes share it; unset values fall
/// through to the next layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Remote the meta repository's own URL is read from.
    pub remote: Option<String>,

    /// Whether checkout may fetch missing submodule commits.
    pub fetch: Option<bool>,
}

/// Resolved configuration with precedence applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    user: ConfigFile,
    repo: ConfigFile,
}

impl Config {
    /// Load configuration for a repository.
    ///
    /// Missing files are treated as empty; malformed files are errors.
    pub fn load(git_dir: &Path) -> Result<Self, ConfigError> {
        let user = match user_config_path() {
            Some(path) => load_file(&path)?,
            None => ConfigFile::default(),
        };
        let repo = load_file(&git_dir.join("gitweave").join("config.toml"))?;
        Ok(Self { user, repo })
    }

    /// Remote name used to resolve the meta repository's own URL.
    pub fn remote(&self) -> &str {
        self.repo
            .remote
            .as_deref()
            .or(self.user.remote.as_deref())
            .unwrap_or("origin")
    }

    /// Whether checkout may fetch missing submodule commits.
    pub fn fetch(&self) -> bool {
        self.repo.fetch.or(self.user.fetch).unwrap_or(true)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gitweave").join("config.toml"))
}

fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ConfigFile::default())
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
