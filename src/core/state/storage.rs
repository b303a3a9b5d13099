//! Checkpoint storage backends

use crate::core::state::checkpoint::Checkpoint;
use crate::domain::context::ResultExt;
use crate::domain::{DistributorError, Result, RunId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Where checkpoints live
#[async_trait]
pub trait CheckpointStorage: Send + Sync {
    /// Load the checkpoint for a run, `Ok(None)` if there is none
    async fn load(&self, run_id: &RunId) -> Result<Option<Checkpoint>>;

    /// Create or replace the checkpoint for its run
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    async fn delete(&self, run_id: &RunId) -> Result<()>;

    async fn list(&self) -> Result<Vec<Checkpoint>>;
}

/// One pretty-printed JSON document per run in a directory
pub struct FileCheckpointStorage {
    dir: PathBuf,
}

impl FileCheckpointStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: &RunId) -> PathBuf {
        self.dir.join(format!("{}.json", run_id.as_str()))
    }

    async fn read_checkpoint(path: &Path) -> Result<Checkpoint> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read checkpoint {}", path.display()))?;
        serde_json::from_str(&json).map_err(|e| {
            DistributorError::State(format!("Corrupt checkpoint {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl CheckpointStorage for FileCheckpointStorage {
    async fn load(&self, run_id: &RunId) -> Result<Option<Checkpoint>> {
        let path = self.path_for(run_id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        Self::read_checkpoint(&path).await.map(Some)
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create checkpoint directory {}", self.dir.display()))?;

        let path = self.path_for(&checkpoint.run_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(checkpoint)?;

        // Write then rename so a crash never leaves a half-written checkpoint
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write checkpoint {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move checkpoint into place {}", path.display()))?;
        Ok(())
    }

    async fn delete(&self, run_id: &RunId) -> Result<()> {
        let path = self.path_for(run_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete checkpoint {}", path.display())),
        }
    }

    async fn list(&self) -> Result<Vec<Checkpoint>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut checkpoints = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_checkpoint(&path).await {
                Ok(checkpoint) => checkpoints.push(checkpoint),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable checkpoint"),
            }
        }

        checkpoints.sort_by(|a, b| a.run_id.as_str().cmp(b.run_id.as_str()));
        Ok(checkpoints)
    }
}

/// In-process checkpoint storage
#[derive(Default)]
pub struct MemoryCheckpointStorage {
    checkpoints: RwLock<HashMap<RunId, Checkpoint>>,
}

impl MemoryCheckpointStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a stored checkpoint without resealing it
    pub async fn insert_raw(&self, checkpoint: Checkpoint) {
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.run_id.clone(), checkpoint);
    }
}

#[async_trait]
impl CheckpointStorage for MemoryCheckpointStorage {
    async fn load(&self, run_id: &RunId) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(run_id).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.insert_raw(checkpoint.clone()).await;
        Ok(())
    }

    async fn delete(&self, run_id: &RunId) -> Result<()> {
        self.checkpoints.write().await.remove(run_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Checkpoint>> {
        let mut checkpoints: Vec<Checkpoint> = self.checkpoints.read().await.values().cloned().collect();
        checkpoints.sort_by(|a, b| a.run_id.as_str().cmp(b.run_id.as_str()));
        Ok(checkpoints)
    }
}
