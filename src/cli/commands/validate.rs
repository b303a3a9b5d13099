//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the distributor configuration file.

use crate::config::load_config;
use crate::core::allocation::ProviderAllocator;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also load and check the service provider allocation rules
    #[arg(long)]
    pub check_allocation: bool,
}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        if let Err(e) = config.validate() {
            println!("❌ Configuration validation failed");
            println!("   Error: {e}");
            println!();
            return Ok(2);
        }

        println!("✅ Configuration is valid");

        if self.check_allocation {
            match ProviderAllocator::from_file(&config.pipeline.allocation_config_path) {
                Ok(allocator) => println!(
                    "✅ Allocation rules loaded: {} rule(s)",
                    allocator.rules().len()
                ),
                Err(e) => {
                    println!("❌ Failed to load allocation rules");
                    println!("   Error: {e}");
                    return Ok(2);
                }
            }
        }

        let rules_types: Vec<String> = config
            .pipeline
            .lookup_rules_types
            .iter()
            .map(ToString::to_string)
            .collect();

        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        for (name, url) in config.services.endpoints() {
            println!("  {name}: {url}");
        }
        println!(
            "  Screening: {} ({})",
            config.pipeline.screening_name, config.pipeline.screening_acronym
        );
        println!("  Ignore Exceptions: {}", config.pipeline.ignore_exceptions);
        println!("  Lookup Rules: {}", rules_types.join(", "));
        println!("  Allocation Rules: {}", config.pipeline.allocation_config_path);
        println!(
            "  Retry: {} attempt(s), {}ms initial delay, x{} backoff",
            config.retry.max_attempts,
            config.retry.initial_delay_ms,
            config.retry.backoff_coefficient
        );
        println!(
            "  Checkpointing: {} ({})",
            config.state.enable_checkpointing, config.state.checkpoint_dir
        );
        println!("  Max Concurrent Records: {}", config.batch.max_concurrent_records);
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_config_is_configuration_error() {
        let args = ValidateArgs {
            check_allocation: false,
        };
        let code = args
            .execute("/nonexistent/distributor.toml")
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
