//! Status command implementation
//!
//! This module implements the `status` command for displaying checkpointed
//! pipeline runs.

use crate::config::load_config;
use crate::core::state::{Checkpoint, CheckpointManager, CheckpointStatus, FileCheckpointStorage};
use clap::Args;
use std::sync::Arc;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Filter by checkpoint status (in_progress, completed, short_circuited, failed)
    #[arg(long)]
    pub status: Option<CheckpointStatus>,

    /// Filter by NHS number
    #[arg(long)]
    pub nhs_number: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking distribution status");

        println!("📊 Distribution Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let storage = FileCheckpointStorage::new(&config.state.checkpoint_dir);
        let manager = CheckpointManager::new(Arc::new(storage));

        let checkpoints = match manager.list(self.status).await {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load checkpoints");
                println!("   Error: {e}");
                return Ok(5); // Fatal error exit code
            }
        };

        let filtered: Vec<&Checkpoint> = checkpoints
            .iter()
            .filter(|c| self.matches(c))
            .collect();

        if filtered.is_empty() {
            println!("No checkpointed runs match the specified filters.");
            println!("Run 'cohort-distributor distribute' to process records.");
            return Ok(0);
        }

        println!("Found {} run(s):", filtered.len());
        println!();
        println!(
            "{:<50} {:<14} {:<20} {:<20}",
            "Run ID", "State", "Status", "Updated"
        );
        println!("{}", "-".repeat(106));

        for checkpoint in filtered {
            let status = match checkpoint.status {
                CheckpointStatus::Completed => "✅ Completed",
                CheckpointStatus::InProgress => "🔄 In Progress",
                CheckpointStatus::ShortCircuited => "⏭️  Short-circuited",
                CheckpointStatus::Failed => "❌ Failed",
            };

            println!(
                "{:<50} {:<14} {:<20} {:<20}",
                checkpoint.run_id.as_str(),
                checkpoint.state.as_str(),
                status,
                checkpoint.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        println!();
        Ok(0)
    }

    fn matches(&self, checkpoint: &Checkpoint) -> bool {
        match &self.nhs_number {
            Some(nhs) => checkpoint.context.record().nhs_number.as_str() == nhs,
            None => true,
        }
    }
}
