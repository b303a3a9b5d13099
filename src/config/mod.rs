//! Configuration management for the distributor.
//!
//! TOML configuration with:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `DISTRIBUTOR_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation of every section on load
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "development"
//!
//! [application]
//! log_level = "info"
//! dry_run = false
//!
//! [services]
//! participant_management_url = "https://cohort.example.nhs.uk/api/ParticipantManagementDataService"
//! cohort_distribution_url = "https://cohort.example.nhs.uk/api/CohortDistributionDataService"
//! static_validation_url = "https://cohort.example.nhs.uk/api/StaticValidation"
//! lookup_validation_url = "https://cohort.example.nhs.uk/api/LookupValidation"
//! transform_url = "https://cohort.example.nhs.uk/api/TransformDataService"
//! exception_url = "https://cohort.example.nhs.uk/api/CreateException"
//! bearer_token = "${DISTRIBUTOR_SERVICE_TOKEN}"
//!
//! [pipeline]
//! ignore_exceptions = false
//! lookup_rules_types = ["CohortDistribution"]
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 1000
//! backoff_coefficient = 2.0
//! ```
//!
//! ```rust,no_run
//! use cohort_distributor::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("distributor.toml")?;
//! println!("Lookup validation: {}", config.services.lookup_validation_url);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, BatchConfig, DistributorConfig, Environment, LoggingConfig,
    PipelineConfig, RetryConfig, ServicesConfig, StateConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
