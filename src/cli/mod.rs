//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for the distributor using clap.

pub mod commands;

use crate::config::ApplicationConfig;
use clap::{Parser, Subcommand};

/// Cohort Distributor - screening participant distribution pipeline
#[derive(Parser, Debug)]
#[command(name = "cohort-distributor")]
#[command(version, about, long_about = None)]
#[command(author = "Cohort Distributor Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "distributor.toml", env = "DISTRIBUTOR_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "DISTRIBUTOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log level from `--log-level`, then the configuration file, then `info`
    pub fn effective_log_level<'a>(&'a self, application: Option<&'a ApplicationConfig>) -> &'a str {
        self.log_level
            .as_deref()
            .or(application.map(|app| app.log_level.as_str()))
            .unwrap_or("info")
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a file of participant records through the distribution pipeline
    Distribute(commands::distribute::DistributeArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show checkpointed runs
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}
