pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a configuration file directly
pub const CONFIG_PATH_ENV: &str = "STACKFLOW_CONFIG_PATH";

const CONFIG_FILE: &str = "stackflow.yaml";
const PROJECT_DIR: &str = ".stackflow";
const PROJECT_CONFIG_FILE: &str = "config.yaml";

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub executor: ExecutorConfig,
    pub state: StateConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Upper bound on full passes over the sorted resource list
    pub max_passes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_passes: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Checkpoint directory, relative to the project root
    pub directory: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(PROJECT_DIR),
        }
    }
}

impl EngineConfig {
    /// Parse a YAML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load the discovered configuration file, or defaults when there is none
    pub fn load_or_default() -> Result<Self> {
        match find_config_file()? {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }
}

/// StackFlow's global configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("stackflow"))
}

/// Locate the configuration file
///
/// Search order:
/// 1. `STACKFLOW_CONFIG_PATH` environment variable
/// 2. `./stackflow.yaml`
/// 3. `./.stackflow/config.yaml`
/// 4. `~/.config/stackflow/config.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let current_dir = std::env::current_dir()?;
    for path in [
        current_dir.join(CONFIG_FILE),
        current_dir.join(PROJECT_DIR).join(PROJECT_CONFIG_FILE),
    ] {
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stackflow").join(PROJECT_CONFIG_FILE);
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}
