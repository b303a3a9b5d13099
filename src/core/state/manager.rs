//! Checkpoint manager
//!
//! Loads and saves checkpoints through a [`CheckpointStorage`] backend and
//! refuses to hand out a checkpoint whose checksum does not match.

use crate::core::state::checkpoint::{Checkpoint, CheckpointStatus};
use crate::core::state::storage::CheckpointStorage;
use crate::domain::{Result, RunId};
use std::sync::Arc;

/// Checkpoint manager for durable pipeline runs
#[derive(Clone)]
pub struct CheckpointManager {
    storage: Arc<dyn CheckpointStorage>,
}

impl CheckpointManager {
    pub fn new(storage: Arc<dyn CheckpointStorage>) -> Self {
        Self { storage }
    }

    /// Load the checkpoint for a run
    ///
    /// # Returns
    ///
    /// `Ok(None)` when there is no checkpoint or the stored one fails its
    /// integrity check.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn load(&self, run_id: &RunId) -> Result<Option<Checkpoint>> {
        let Some(checkpoint) = self.storage.load(run_id).await? else {
            return Ok(None);
        };

        if !checkpoint.verify_checksum()? {
            tracing::warn!(
                run_id = %run_id,
                state = %checkpoint.state,
                "Checkpoint checksum mismatch, ignoring stored state"
            );
            return Ok(None);
        }

        Ok(Some(checkpoint))
    }

    /// Save a checkpoint after a state transition
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        tracing::debug!(
            run_id = %checkpoint.run_id,
            state = %checkpoint.state,
            status = %checkpoint.status,
            "Checkpointing run"
        );
        self.storage.save(checkpoint).await
    }

    pub async fn delete(&self, run_id: &RunId) -> Result<()> {
        self.storage.delete(run_id).await
    }

    /// All stored checkpoints, optionally restricted to one status
    pub async fn list(&self, status: Option<CheckpointStatus>) -> Result<Vec<Checkpoint>> {
        let checkpoints = self.storage.list().await?;
        Ok(match status {
            Some(status) => checkpoints.into_iter().filter(|c| c.status == status).collect(),
            None => checkpoints,
        })
    }
}
