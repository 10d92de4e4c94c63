use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tix_types::EntityId;

use crate::error::{RepoError, RepoResult};

/// Per-repository settings, stored as `config.toml` in the metadata dir.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub user: UserConfig,
    pub signing: SigningConfig,
    pub cache: CacheConfig,
    /// Remote name to repository path.
    pub remotes: BTreeMap<String, PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub name: Option<String>,
    pub email: Option<String>,
    /// The identity entity acting on behalf of the local user.
    pub identity: Option<EntityId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub enabled: bool,
    /// Hex-encoded Ed25519 secret, relative to the metadata dir.
    pub key_file: PathBuf,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key_file: PathBuf::from("signing.key"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on fully loaded entities kept in memory.
    pub max_loaded: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_loaded: 1000 }
    }
}

impl RepoConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> RepoResult<Self> {
        match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|e| RepoError::Config(e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> RepoResult<()> {
        let text = toml::to_string_pretty(self).map_err(|e| RepoError::Config(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }
}
