//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "distributor.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing distributor configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your service endpoints", self.output);
                println!("  2. Provide an allocation rules file (allocationConfig.json)");
                println!("  3. Create a .env file with DISTRIBUTOR_SERVICE_TOKEN if services need auth");
                println!("  4. Validate configuration: cohort-distributor validate-config");
                println!("  5. Distribute records: cohort-distributor distribute <records.json>");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# Cohort Distributor Configuration File

environment = "development"

[application]
log_level = "info"
dry_run = false

[services]
participant_management_url = "http://localhost:7071/api/ParticipantManagementDataService"
cohort_distribution_url = "http://localhost:7071/api/CohortDistributionDataService"
static_validation_url = "http://localhost:7071/api/StaticValidation"
lookup_validation_url = "http://localhost:7071/api/LookupValidation"
transform_url = "http://localhost:7071/api/TransformDataService"
exception_url = "http://localhost:7071/api/CreateException"
timeout_seconds = 30
# bearer_token = "${DISTRIBUTOR_SERVICE_TOKEN}"

[pipeline]
ignore_exceptions = false
is_extracted_to_bs_select = false
screening_name = "Breast Screening"
screening_acronym = "BSS"
lookup_rules_types = ["CohortDistribution"]
allocation_config_path = "allocationConfig.json"

[retry]
max_attempts = 3
initial_delay_ms = 1000
backoff_coefficient = 2.0

[state]
enable_checkpointing = true
checkpoint_dir = "checkpoints"

[batch]
max_concurrent_records = 8

[logging]
local_enabled = false
local_path = "logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# Cohort Distributor Configuration File
#
# This file contains all configuration options with examples and explanations.
# Any value may reference an environment variable as ${VAR_NAME}, and any key
# may be overridden with DISTRIBUTOR_<SECTION>_<KEY>.

# development | staging | production
environment = "development"

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Dry run mode (run every stage, write nothing)
dry_run = false

# ============================================================================
# Collaborating Services
# ============================================================================
[services]
# Participant management data service (fetch record, raise exception flag)
participant_management_url = "https://cohort.example.nhs.uk/api/ParticipantManagementDataService"

# Cohort distribution data service (latest distribution, persist)
cohort_distribution_url = "https://cohort.example.nhs.uk/api/CohortDistributionDataService"

# Rule services
static_validation_url = "https://cohort.example.nhs.uk/api/StaticValidation"
lookup_validation_url = "https://cohort.example.nhs.uk/api/LookupValidation"

# Builds the distribution record
transform_url = "https://cohort.example.nhs.uk/api/TransformDataService"

# Validation and system exception sink
exception_url = "https://cohort.example.nhs.uk/api/CreateException"

# Per-request timeout in seconds
timeout_seconds = 30

# Optional bearer token sent to every service (use environment variable)
# bearer_token = "${DISTRIBUTOR_SERVICE_TOKEN}"

# TLS certificate verification (cannot be disabled in production)
tls_verify = true

# ============================================================================
# Pipeline Behaviour
# ============================================================================
[pipeline]
# Continue past active exception flags and fatal validation outcomes
ignore_exceptions = false

# Value written to IsExtracted on persisted records
is_extracted_to_bs_select = false

# Screening programme stamped on fetched records
screening_name = "Breast Screening"
screening_acronym = "BSS"

# Rule sets evaluated by lookup validation, in merge order
# (ParticipantManagement | CohortDistribution)
lookup_rules_types = ["CohortDistribution"]

# Postcode-prefix service provider allocation rules
allocation_config_path = "allocationConfig.json"

# ============================================================================
# Retry Policy (lookup validation)
# ============================================================================
[retry]
# Total attempts including the first
max_attempts = 3

# Delay before the second attempt
initial_delay_ms = 1000

# Each further delay is multiplied by this
backoff_coefficient = 2.0

# Upper bound for any single delay
max_delay_ms = 30000

# Timeout for each attempt
attempt_timeout_ms = 30000

# ============================================================================
# Checkpointing
# ============================================================================
[state]
# Save a checkpoint after every stage so interrupted runs can resume
enable_checkpointing = true

# Directory holding one JSON checkpoint per run
checkpoint_dir = "checkpoints"

# ============================================================================
# Batch Processing
# ============================================================================
[batch]
# Number of records run through the pipeline concurrently
max_concurrent_records = 8

# ============================================================================
# Logging Configuration
# ============================================================================
[logging]
# Enable local file logging
local_enabled = true

# Local log directory
local_path = "/var/log/cohort-distributor"

# Log rotation (daily, hourly, never)
local_rotation = "daily"
"#
        .to_string()
    }
}
