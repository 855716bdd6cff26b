//! Checkpoint state
//!
//! Manages the `.stackflow/state.json` file which records the definition a
//! run was applied from and every resource it created.

use crate::error::{CloudError, Result};
use crate::executor::{CreatedResource, RunReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackflow_config::EngineConfig;
use stackflow_core::DefinitionTree;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".stackflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Snapshot written after a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Definition tree document, with identities assigned during the run
    pub definition: serde_json::Value,

    /// Resources created by the run
    pub created: Vec<CreatedResource>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            definition: serde_json::Value::Null,
            created: Vec::new(),
        }
    }
}

impl Checkpoint {
    pub fn new(definition: &DefinitionTree, created: &[CreatedResource]) -> Self {
        Self {
            definition: definition.to_document(),
            created: created.to_vec(),
            ..Self::default()
        }
    }

    pub fn from_report(definition: &DefinitionTree, report: &RunReport) -> Self {
        Self::new(definition, &report.created)
    }

    pub fn created_resource(&self, name: &str) -> Option<&CreatedResource> {
        self.created.iter().find(|c| c.name == name)
    }
}

/// State manager for reading/writing checkpoint files
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,

    /// State directory relative to the project root
    directory: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self::with_directory(project_root, STATE_DIR)
    }

    pub fn with_directory(project_root: impl AsRef<Path>, directory: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(project_root: impl AsRef<Path>, config: &EngineConfig) -> Self {
        Self::with_directory(project_root, &config.state.directory)
    }

    /// Get the state directory path
    pub fn state_dir(&self) -> PathBuf {
        self.project_root.join(&self.directory)
    }

    /// Get the state file path
    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current checkpoint, or an empty one when none was saved yet
    pub async fn load(&self) -> Result<Checkpoint> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty checkpoint");
            return Ok(Checkpoint::default());
        }

        let content = fs::read_to_string(&path).await?;
        let checkpoint: Checkpoint = serde_json::from_str(&content)?;

        if checkpoint.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                checkpoint.version, STATE_VERSION
            )));
        }

        tracing::debug!(
            "Loaded checkpoint with {} created resource(s)",
            checkpoint.created.len()
        );
        Ok(checkpoint)
    }

    /// Save the checkpoint, keeping the previous file as a backup
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(checkpoint)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved checkpoint to {}", path.display());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Locks older than an hour are stale
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(CloudError::LockError(format!(
                    "State is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for the state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::ResourceNode;
    use stackflow_core::catalog::network;
    use tempfile::tempdir;

    fn checkpoint() -> Checkpoint {
        let mut tree = DefinitionTree::new("t");
        let mut net = ResourceNode::new(network::schema(), "main").unwrap();
        net.set("cidr_block", "10.0.0.0/16").unwrap();
        tree.add(net).unwrap();
        tree.assign_identity("main", "1").unwrap();

        let created = vec![CreatedResource {
            name: "main".to_string(),
            kind: "network".to_string(),
            id: "1".to_string(),
            created_at: Utc::now(),
        }];
        Checkpoint::new(&tree, &created)
    }

    #[tokio::test]
    async fn test_checkpoint_save_load() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        manager.save(&checkpoint()).await.unwrap();

        let loaded = manager.load().await.unwrap();
        assert_eq!(loaded.created.len(), 1);
        assert_eq!(loaded.created_resource("main").unwrap().id, "1");
        assert_eq!(loaded.definition["name"], serde_json::json!("t"));
    }

    #[tokio::test]
    async fn test_empty_state() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let checkpoint = manager.load().await.unwrap();
        assert!(checkpoint.created.is_empty());
    }

    #[tokio::test]
    async fn test_backup_and_custom_directory() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::with_directory(temp_dir.path(), "state");

        manager.save(&Checkpoint::default()).await.unwrap();
        manager.save(&checkpoint()).await.unwrap();

        let dir = temp_dir.path().join("state");
        assert!(dir.join("state.json").exists());
        assert!(dir.join("state.json.backup").exists());
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());
        let checkpoint = Checkpoint {
            version: STATE_VERSION + 1,
            ..Checkpoint::default()
        };
        manager.save(&checkpoint).await.unwrap();

        assert!(matches!(
            manager.load().await,
            Err(CloudError::StateError(_))
        ));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let temp_dir = tempdir().unwrap();
        let manager = StateManager::new(temp_dir.path());

        let lock = manager.acquire_lock().await.unwrap();
        assert!(matches!(
            manager.acquire_lock().await,
            Err(CloudError::LockError(_))
        ));
        lock.release().await.unwrap();

        let lock = manager.acquire_lock().await.unwrap();
        drop(lock);
        assert!(!temp_dir.path().join(".stackflow/lock.json").exists());
    }
}
