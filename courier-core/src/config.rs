//! Optional YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.courier/
//!   config.yaml        (optional: defaults apply when absent)
//!   store/store.json   (default JSON repository)
//!   watermarks.json    (last applied export timestamp per source folder)
//! ```
//!
//! # API pattern
//!
//! Every function touching `~/.courier` takes the home directory explicitly
//! (`fn_at(home: &Path, …)`), so tests can point it at a `TempDir`. Callers
//! get the real one from [`home`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entity_type::{EntityTypeDef, EntityTypeRegistry};
use crate::error::ConfigError;

/// Contents of `~/.courier/config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Source folder used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_folder: Option<PathBuf>,
    /// Directory of the JSON repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,
    /// Entity types added to, or replacing, the built-in table.
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDef>,
}

impl Config {
    /// The configured store directory, or `<home>/.courier/store`.
    pub fn store_dir_at(&self, home: &Path) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| courier_root(home).join("store"))
    }

    /// Built-in entity types overlaid with the configured ones.
    pub fn entity_types(&self) -> EntityTypeRegistry {
        EntityTypeRegistry::default().with_overrides(self.entity_types.iter().cloned())
    }
}

/// `<home>/.courier/`
pub fn courier_root(home: &Path) -> PathBuf {
    home.join(".courier")
}

/// `<home>/.courier/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    courier_root(home).join("config.yaml")
}

/// Load `<home>/.courier/config.yaml`, falling back to defaults when absent.
///
/// Returns `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(home: &Path) -> Result<Config, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// The user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
