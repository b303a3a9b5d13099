//! Configuration schema types
//!
//! This module defines the configuration structure for the distributor.

use crate::config::SecretString;
use crate::domain::RulesType;
use serde::{Deserialize, Serialize};

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main distributor configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributorConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Collaborator service endpoints
    pub services: ServicesConfig,

    /// Pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retry policy for the lookup validation stage
    #[serde(default)]
    pub retry: RetryConfig,

    /// Checkpoint state
    #[serde(default)]
    pub state: StateConfig,

    /// Batch execution
    #[serde(default)]
    pub batch: BatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DistributorConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.services.validate(&self.environment)?;
        self.pipeline.validate()?;
        self.retry.validate()?;
        self.state.validate()?;
        self.batch.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode: every stage runs but nothing is written to the
    /// distribution store or the participant management store
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Collaborator service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Participant management data service
    pub participant_management_url: String,

    /// Cohort distribution data service
    pub cohort_distribution_url: String,

    /// Static validation rule service
    pub static_validation_url: String,

    /// Lookup validation rule service
    pub lookup_validation_url: String,

    /// Transform service
    pub transform_url: String,

    /// Exception sink
    pub exception_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Optional bearer token sent to every service
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub bearer_token: Option<SecretString>,

    /// TLS certificate verification enabled
    ///
    /// **SECURITY WARNING**: may only be disabled outside production.
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

impl ServicesConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        use secrecy::ExposeSecret;

        for (name, url) in self.endpoints() {
            if url.is_empty() {
                return Err(format!("services.{name} cannot be empty"));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!(
                    "services.{name} must start with http:// or https://"
                ));
            }
        }

        if self.timeout_seconds == 0 {
            return Err("services.timeout_seconds must be > 0".to_string());
        }

        if let Some(token) = &self.bearer_token {
            if token.expose_secret().is_empty() {
                return Err("services.bearer_token cannot be empty when set".to_string());
            }
        }

        if *environment == Environment::Production && !self.tls_verify {
            return Err(
                "TLS certificate verification cannot be disabled in production environments"
                    .to_string(),
            );
        }

        Ok(())
    }

    /// Named endpoints, in a fixed order
    pub fn endpoints(&self) -> [(&'static str, &str); 6] {
        [
            ("participant_management_url", &self.participant_management_url),
            ("cohort_distribution_url", &self.cohort_distribution_url),
            ("static_validation_url", &self.static_validation_url),
            ("lookup_validation_url", &self.lookup_validation_url),
            ("transform_url", &self.transform_url),
            ("exception_url", &self.exception_url),
        ]
    }
}

/// Pipeline behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Continue past active exception flags and fatal violations
    #[serde(default)]
    pub ignore_exceptions: bool,

    /// Value written to the `IsExtracted` field of persisted records
    #[serde(default)]
    pub is_extracted_to_bs_select: bool,

    /// Screening programme name stamped on fetched records
    #[serde(default = "default_screening_name")]
    pub screening_name: String,

    /// Screening programme acronym, also the allocation service key
    #[serde(default = "default_screening_acronym")]
    pub screening_acronym: String,

    /// Rule sets the lookup validation stage evaluates, in merge order
    #[serde(default = "default_lookup_rules_types")]
    pub lookup_rules_types: Vec<RulesType>,

    /// Path to the service provider allocation rules (JSON)
    #[serde(default = "default_allocation_config_path")]
    pub allocation_config_path: String,
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), String> {
        if self.screening_name.trim().is_empty() {
            return Err("pipeline.screening_name cannot be empty".to_string());
        }
        if self.screening_acronym.trim().is_empty() {
            return Err("pipeline.screening_acronym cannot be empty".to_string());
        }
        if self.lookup_rules_types.is_empty() {
            return Err("pipeline.lookup_rules_types cannot be empty".to_string());
        }
        if self.allocation_config_path.trim().is_empty() {
            return Err("pipeline.allocation_config_path cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ignore_exceptions: false,
            is_extracted_to_bs_select: false,
            screening_name: default_screening_name(),
            screening_acronym: default_screening_acronym(),
            lookup_rules_types: default_lookup_rules_types(),
            allocation_config_path: default_allocation_config_path(),
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Backoff coefficient
    #[serde(default = "default_backoff_coefficient")]
    pub backoff_coefficient: f64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Timeout for a single attempt in milliseconds (0 disables it)
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(format!(
                "retry.max_attempts must be between 1 and 10, got {}",
                self.max_attempts
            ));
        }
        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(format!(
                "retry.backoff_coefficient must be >= 1.0, got {}",
                self.backoff_coefficient
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(format!(
                "retry.initial_delay_ms ({}) cannot exceed retry.max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_coefficient: default_backoff_coefficient(),
            max_delay_ms: default_max_delay_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

/// State management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Enable checkpointing
    #[serde(default = "default_true")]
    pub enable_checkpointing: bool,

    /// Directory holding one checkpoint document per run
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,
}

impl StateConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enable_checkpointing && self.checkpoint_dir.trim().is_empty() {
            return Err(
                "state.checkpoint_dir cannot be empty when checkpointing is enabled".to_string(),
            );
        }
        Ok(())
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            enable_checkpointing: true,
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}

/// Batch execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of records orchestrated concurrently
    #[serde(default = "default_max_concurrent_records")]
    pub max_concurrent_records: usize,
}

impl BatchConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_records == 0 || self.max_concurrent_records > 100 {
            return Err(format!(
                "batch.max_concurrent_records must be between 1 and 100, got {}",
                self.max_concurrent_records
            ));
        }
        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_records: default_max_concurrent_records(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_screening_name() -> String {
    "Breast Screening".to_string()
}

fn default_screening_acronym() -> String {
    "BSS".to_string()
}

fn default_lookup_rules_types() -> Vec<RulesType> {
    vec![RulesType::CohortDistribution]
}

fn default_allocation_config_path() -> String {
    "allocationConfig.json".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_coefficient() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_attempt_timeout_ms() -> u64 {
    30000
}

fn default_checkpoint_dir() -> String {
    "checkpoints".to_string()
}

fn default_max_concurrent_records() -> usize {
    8
}

fn default_local_path() -> String {
    "logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn services() -> ServicesConfig {
        ServicesConfig {
            participant_management_url: "http://localhost:7001/api/ParticipantManagementDataService".to_string(),
            cohort_distribution_url: "http://localhost:7002/api/CohortDistributionDataService".to_string(),
            static_validation_url: "http://localhost:7003/api/StaticValidation".to_string(),
            lookup_validation_url: "http://localhost:7004/api/LookupValidation".to_string(),
            transform_url: "http://localhost:7005/api/TransformDataService".to_string(),
            exception_url: "http://localhost:7006/api/CreateException".to_string(),
            timeout_seconds: 30,
            bearer_token: None,
            tls_verify: true,
        }
    }

    fn config() -> DistributorConfig {
        DistributorConfig {
            application: ApplicationConfig::default(),
            environment: Environment::Development,
            services: services(),
            pipeline: PipelineConfig::default(),
            retry: RetryConfig::default(),
            state: StateConfig::default(),
            batch: BatchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut c = config();
        c.application.log_level = "verbose".to_string();
        assert!(c.validate().unwrap_err().contains("log_level"));
    }

    #[test]
    fn test_service_url_scheme() {
        let mut c = config();
        c.services.transform_url = "ftp://transform".to_string();
        assert!(c.validate().unwrap_err().contains("services.transform_url"));
    }

    #[test]
    fn test_tls_verify_enforced_in_production() {
        let mut c = config();
        c.services.tls_verify = false;
        assert!(c.validate().is_ok());

        c.environment = Environment::Production;
        assert!(c.validate().unwrap_err().contains("TLS"));
    }

    #[test]
    fn test_empty_bearer_token_rejected() {
        let mut c = config();
        c.services.bearer_token = Some(secret_string(String::new()));
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_retry_bounds() {
        let mut c = config();
        c.retry.max_attempts = 0;
        assert!(c.validate().is_err());

        let mut c = config();
        c.retry.backoff_coefficient = 0.5;
        assert!(c.validate().is_err());

        let mut c = config();
        c.retry.initial_delay_ms = 60_000;
        assert!(c.validate().unwrap_err().contains("max_delay_ms"));
    }

    #[test]
    fn test_lookup_rules_types_required() {
        let mut c = config();
        c.pipeline.lookup_rules_types.clear();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_batch_concurrency_bounds() {
        let mut c = config();
        c.batch.max_concurrent_records = 0;
        assert!(c.validate().is_err());
        c.batch.max_concurrent_records = 101;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_pipeline_defaults() {
        let pipeline = PipelineConfig::default();
        assert!(!pipeline.ignore_exceptions);
        assert_eq!(pipeline.screening_acronym, "BSS");
        assert_eq!(pipeline.lookup_rules_types, vec![RulesType::CohortDistribution]);
    }
}
