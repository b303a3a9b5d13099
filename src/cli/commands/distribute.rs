//! Distribute command implementation
//!
//! This module implements the `distribute` command, which reads participant
//! records from a file and runs each through the distribution pipeline.

use crate::config::load_config;
use crate::core::batch::{BatchRunner, Submission};
use crate::core::pipeline::Orchestrator;
use crate::domain::ParticipantRecord;
use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the distribute command
#[derive(Args, Debug)]
pub struct DistributeArgs {
    /// JSON array or JSON-lines file of participant records
    pub input: PathBuf,

    /// File origin recorded against every run (defaults to the input file name)
    #[arg(long)]
    pub file_origin: Option<String>,

    /// Dry run mode - run every stage without writing to any store
    #[arg(long)]
    pub dry_run: bool,

    /// Continue past unresolved exceptions and fatal validation outcomes
    #[arg(long)]
    pub ignore_exceptions: bool,

    /// Override the number of records processed concurrently
    #[arg(long)]
    pub max_concurrent: Option<usize>,
}

impl DistributeArgs {
    /// Execute the distribute command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(input = %self.input.display(), "Starting distribute command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        // Apply CLI overrides
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }
        if self.ignore_exceptions {
            tracing::info!("Ignoring exceptions from CLI");
            config.pipeline.ignore_exceptions = true;
        }
        if let Some(max) = self.max_concurrent {
            tracing::info!(max_concurrent = max, "Overriding batch concurrency from CLI");
            config.batch.max_concurrent_records = max;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let records = match read_records(&self.input) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read participant records");
                eprintln!("Failed to read participant records: {e:#}");
                return Ok(5); // Fatal error exit code
            }
        };

        let file_origin = self
            .file_origin
            .clone()
            .unwrap_or_else(|| default_file_origin(&self.input));
        let submissions: Vec<Submission> = records
            .into_iter()
            .map(|record| Submission::new(record, &file_origin))
            .collect();

        if config.application.dry_run {
            println!("🔍 DRY RUN MODE - No data will be written");
            println!();
        }

        let orchestrator = match Orchestrator::from_config(&config) {
            Ok(o) => o.with_shutdown(shutdown_signal),
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialise pipeline");
                eprintln!("Failed to initialise pipeline: {e}");
                return Ok(4); // Connection error exit code
            }
        };

        println!("🚀 Distributing {} record(s) from {}...", submissions.len(), file_origin);
        println!();

        let runner = BatchRunner::new(Arc::new(orchestrator), config.batch.max_concurrent_records);
        let summary = runner.run(submissions).await;

        println!("📊 Distribution Summary:");
        println!("  Batch: {}", summary.batch_id);
        println!("  Total Records: {}", summary.total_records);
        println!("  Completed: {}", summary.completed);
        println!("  Short-circuited: {}", summary.short_circuited);
        println!("  Failed: {}", summary.failed);
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!("  Success Rate: {:.2}%", summary.success_rate());
        println!();

        if !summary.errors.is_empty() {
            println!("⚠️  Errors encountered:");
            for error in summary.errors.iter().take(10) {
                println!("  - {}: {}", error.run_id, error.failure);
            }
            if summary.errors.len() > 10 {
                println!("  ... and {} more", summary.errors.len() - 10);
            }
            println!();
        }

        let exit_code = if summary.interrupted {
            println!("⚠️  Distribution interrupted gracefully. Progress saved.");
            println!("   Run the same command to resume from checkpoint.");
            tracing::info!("Distribution interrupted by user signal");
            130 // SIGINT exit code (standard Unix convention)
        } else if summary.is_successful() {
            println!("✅ Distribution completed successfully!");
            0
        } else {
            println!("⚠️  Distribution completed with failures");
            1 // Partial success
        };

        Ok(exit_code)
    }
}

/// Read participant records from a JSON array or JSON-lines file
pub fn read_records(path: &Path) -> anyhow::Result<Vec<ParticipantRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    if contents.trim_start().starts_with('[') {
        return serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON array in {}", path.display()));
    }

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("failed to parse record on line {}", index + 1))
        })
        .collect()
}

fn default_file_origin(input: &Path) -> String {
    input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string())
}
