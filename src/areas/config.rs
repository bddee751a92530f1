//! Repository configuration
//!
//! Stored as TOML at `.git/config.toml`:
//!
//! ```toml
//! default_branch = "master"
//!
//! [remotes.origin]
//! url = "/srv/repos/upstream"
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_REMOTE: &str = "origin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub default_branch: String,
    pub remotes: BTreeMap<String, RemoteConfig>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_branch: DEFAULT_BRANCH.to_string(),
            remotes: BTreeMap::new(),
        }
    }
}

impl RepositoryConfig {
    /// Load the configuration, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("invalid config at {:?}", path))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, content).with_context(|| format!("failed to write config at {:?}", path))
    }

    pub fn remote_url(&self, remote: &str) -> anyhow::Result<&str> {
        self.remotes
            .get(remote)
            .map(|remote| remote.url.as_str())
            .with_context(|| format!("no such remote: {remote}"))
    }

    pub fn set_remote(&mut self, remote: impl Into<String>, url: impl Into<String>) {
        self.remotes
            .insert(remote.into(), RemoteConfig { url: url.into() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();

        let config = RepositoryConfig::load(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config, RepositoryConfig::default());
        assert!(config.remote_url(DEFAULT_REMOTE).is_err());
    }

    #[test]
    fn remotes_survive_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = RepositoryConfig::default();
        config.set_remote(DEFAULT_REMOTE, "/tmp/upstream");

        config.save(&path).unwrap();
        let loaded = RepositoryConfig::load(&path).unwrap();

        assert_eq!(loaded.remote_url(DEFAULT_REMOTE).unwrap(), "/tmp/upstream");
        assert_eq!(loaded.default_branch, "master");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_branch = \"main\"\n").unwrap();

        let config = RepositoryConfig::load(&path).unwrap();

        assert_eq!(config.default_branch, "main");
        assert!(config.remotes.is_empty());
    }
}
