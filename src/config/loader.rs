//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::DistributorConfig;
use super::secret::secret_string;
use crate::domain::errors::DistributorError;
use crate::domain::result::Result;
use crate::domain::RulesType;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into DistributorConfig
/// 4. Applies environment variable overrides (DISTRIBUTOR_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, a referenced
/// environment variable is missing, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use cohort_distributor::config::loader::load_config;
///
/// let config = load_config("distributor.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<DistributorConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(DistributorError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        DistributorError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: DistributorConfig = toml::from_str(&contents)?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        DistributorError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| DistributorError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(DistributorError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    value.trim().parse().map_err(|_| {
        DistributorError::Configuration(format!("{name} must be true or false, got '{value}'"))
    })
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        DistributorError::Configuration(format!("{name} must be a number, got '{value}'"))
    })
}

fn parse_rules_types(value: &str) -> Result<Vec<RulesType>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s {
            "ParticipantManagement" => Ok(RulesType::ParticipantManagement),
            "CohortDistribution" => Ok(RulesType::CohortDistribution),
            other => Err(DistributorError::Configuration(format!(
                "Unknown rules type '{other}'"
            ))),
        })
        .collect()
}

/// Applies environment variable overrides using DISTRIBUTOR_* prefix
///
/// Environment variables follow the pattern: DISTRIBUTOR_<SECTION>_<KEY>
/// For example: DISTRIBUTOR_PIPELINE_IGNORE_EXCEPTIONS, DISTRIBUTOR_RETRY_MAX_ATTEMPTS
fn apply_env_overrides(config: &mut DistributorConfig) -> Result<()> {
    let var = |name: &str| std::env::var(name).ok();

    // Application overrides
    if let Some(val) = var("DISTRIBUTOR_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = var("DISTRIBUTOR_APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_bool("DISTRIBUTOR_APPLICATION_DRY_RUN", &val)?;
    }

    // Service overrides
    if let Some(val) = var("DISTRIBUTOR_SERVICES_PARTICIPANT_MANAGEMENT_URL") {
        config.services.participant_management_url = val;
    }
    if let Some(val) = var("DISTRIBUTOR_SERVICES_COHORT_DISTRIBUTION_URL") {
        config.services.cohort_distribution_url = val;
    }
    if let Some(val) = var("DISTRIBUTOR_SERVICES_STATIC_VALIDATION_URL") {
        config.services.static_validation_url = val;
    }
    if let Some(val) = var("DISTRIBUTOR_SERVICES_LOOKUP_VALIDATION_URL") {
        config.services.lookup_validation_url = val;
    }
    if let Some(val) = var("DISTRIBUTOR_SERVICES_TRANSFORM_URL") {
        config.services.transform_url = val;
    }
    if let Some(val) = var("DISTRIBUTOR_SERVICES_EXCEPTION_URL") {
        config.services.exception_url = val;
    }
    if let Some(val) = var("DISTRIBUTOR_SERVICES_TIMEOUT_SECONDS") {
        config.services.timeout_seconds =
            parse_number("DISTRIBUTOR_SERVICES_TIMEOUT_SECONDS", &val)?;
    }
    if let Some(val) = var("DISTRIBUTOR_SERVICES_BEARER_TOKEN") {
        config.services.bearer_token = Some(secret_string(val));
    }
    if let Some(val) = var("DISTRIBUTOR_SERVICES_TLS_VERIFY") {
        config.services.tls_verify = parse_bool("DISTRIBUTOR_SERVICES_TLS_VERIFY", &val)?;
    }

    // Pipeline overrides
    if let Some(val) = var("DISTRIBUTOR_PIPELINE_IGNORE_EXCEPTIONS") {
        config.pipeline.ignore_exceptions =
            parse_bool("DISTRIBUTOR_PIPELINE_IGNORE_EXCEPTIONS", &val)?;
    }
    if let Some(val) = var("DISTRIBUTOR_PIPELINE_IS_EXTRACTED_TO_BS_SELECT") {
        config.pipeline.is_extracted_to_bs_select =
            parse_bool("DISTRIBUTOR_PIPELINE_IS_EXTRACTED_TO_BS_SELECT", &val)?;
    }
    if let Some(val) = var("DISTRIBUTOR_PIPELINE_LOOKUP_RULES_TYPES") {
        config.pipeline.lookup_rules_types = parse_rules_types(&val)?;
    }
    if let Some(val) = var("DISTRIBUTOR_PIPELINE_ALLOCATION_CONFIG_PATH") {
        config.pipeline.allocation_config_path = val;
    }

    // Retry overrides
    if let Some(val) = var("DISTRIBUTOR_RETRY_MAX_ATTEMPTS") {
        config.retry.max_attempts = parse_number("DISTRIBUTOR_RETRY_MAX_ATTEMPTS", &val)?;
    }
    if let Some(val) = var("DISTRIBUTOR_RETRY_INITIAL_DELAY_MS") {
        config.retry.initial_delay_ms = parse_number("DISTRIBUTOR_RETRY_INITIAL_DELAY_MS", &val)?;
    }
    if let Some(val) = var("DISTRIBUTOR_RETRY_BACKOFF_COEFFICIENT") {
        config.retry.backoff_coefficient =
            parse_number("DISTRIBUTOR_RETRY_BACKOFF_COEFFICIENT", &val)?;
    }

    // State overrides
    if let Some(val) = var("DISTRIBUTOR_STATE_ENABLE_CHECKPOINTING") {
        config.state.enable_checkpointing =
            parse_bool("DISTRIBUTOR_STATE_ENABLE_CHECKPOINTING", &val)?;
    }
    if let Some(val) = var("DISTRIBUTOR_STATE_CHECKPOINT_DIR") {
        config.state.checkpoint_dir = val;
    }

    // Batch overrides
    if let Some(val) = var("DISTRIBUTOR_BATCH_MAX_CONCURRENT_RECORDS") {
        config.batch.max_concurrent_records =
            parse_number("DISTRIBUTOR_BATCH_MAX_CONCURRENT_RECORDS", &val)?;
    }

    // Logging overrides
    if let Some(val) = var("DISTRIBUTOR_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_bool("DISTRIBUTOR_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("DISTRIBUTOR_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
