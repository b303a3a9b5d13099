//! Integration tests for configuration loading and validation
//!
//! Tests that modify environment variables hold `ENV_MUTEX` so they do not
//! interfere with each other.

use cohort_distributor::config::{load_config, Environment};
use cohort_distributor::core::pipeline::PipelineSettings;
use cohort_distributor::domain::RulesType;
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const SERVICES: &str = r#"
[services]
participant_management_url = "https://cohort.example.nhs.uk/api/ParticipantManagementDataService"
cohort_distribution_url = "https://cohort.example.nhs.uk/api/CohortDistributionDataService"
static_validation_url = "https://cohort.example.nhs.uk/api/StaticValidation"
lookup_validation_url = "https://cohort.example.nhs.uk/api/LookupValidation"
transform_url = "https://cohort.example.nhs.uk/api/TransformDataService"
exception_url = "https://cohort.example.nhs.uk/api/CreateException"
"#;

/// Helper function to clean up environment variables
fn cleanup_env_vars() {
    std::env::remove_var("DISTRIBUTOR_APPLICATION_LOG_LEVEL");
    std::env::remove_var("DISTRIBUTOR_APPLICATION_DRY_RUN");
    std::env::remove_var("DISTRIBUTOR_PIPELINE_IGNORE_EXCEPTIONS");
    std::env::remove_var("DISTRIBUTOR_PIPELINE_LOOKUP_RULES_TYPES");
    std::env::remove_var("DISTRIBUTOR_RETRY_MAX_ATTEMPTS");
    std::env::remove_var("TEST_DISTRIBUTOR_TOKEN");
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = format!(
        r#"
environment = "staging"

[application]
log_level = "debug"
dry_run = true
{SERVICES}
timeout_seconds = 10
tls_verify = true

[pipeline]
ignore_exceptions = true
is_extracted_to_bs_select = true
screening_name = "Bowel Screening"
screening_acronym = "BCS"
lookup_rules_types = ["ParticipantManagement", "CohortDistribution"]
allocation_config_path = "/etc/distributor/allocationConfig.json"

[retry]
max_attempts = 5
initial_delay_ms = 250
backoff_coefficient = 1.5
max_delay_ms = 4000
attempt_timeout_ms = 0

[state]
enable_checkpointing = false
checkpoint_dir = "/var/lib/distributor"

[batch]
max_concurrent_records = 16

[logging]
local_enabled = false
local_path = "/tmp/distributor"
local_rotation = "hourly"
"#
    );

    let temp_file = write_config(&toml_content);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    assert_eq!(config.environment, Environment::Staging);
    assert_eq!(config.application.log_level, "debug");
    assert!(config.application.dry_run);
    assert_eq!(config.services.timeout_seconds, 10);
    assert!(config.pipeline.ignore_exceptions);
    assert_eq!(config.pipeline.screening_acronym, "BCS");
    assert_eq!(
        config.pipeline.lookup_rules_types,
        vec![RulesType::ParticipantManagement, RulesType::CohortDistribution]
    );
    assert_eq!(config.retry.max_attempts, 5);
    assert!(!config.state.enable_checkpointing);
    assert_eq!(config.batch.max_concurrent_records, 16);
    assert_eq!(config.logging.local_rotation, "hourly");

    let settings = PipelineSettings::from_config(&config);
    assert!(settings.dry_run);
    assert!(settings.extracted_to_bs_select);
    assert_eq!(settings.retry.initial_delay, Duration::from_millis(250));
    assert!(settings.retry.attempt_timeout.is_none());
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let temp_file = write_config(SERVICES);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.application.log_level, "info");
    assert!(!config.application.dry_run);
    assert!(!config.pipeline.ignore_exceptions);
    assert_eq!(config.pipeline.screening_name, "Breast Screening");
    assert_eq!(config.pipeline.screening_acronym, "BSS");
    assert_eq!(
        config.pipeline.lookup_rules_types,
        vec![RulesType::CohortDistribution]
    );
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.initial_delay_ms, 1000);
    assert!(config.state.enable_checkpointing);
    assert_eq!(config.state.checkpoint_dir, "checkpoints");
    assert!(config.services.bearer_token.is_none());
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_DISTRIBUTOR_TOKEN", "secret-token");

    let toml_content = format!("{SERVICES}bearer_token = \"${{TEST_DISTRIBUTOR_TOKEN}}\"\n");
    let temp_file = write_config(&toml_content);
    let config = load_config(temp_file.path()).expect("Failed to load config");

    let token = config.services.bearer_token.expect("token should be set");
    let token: &str = token.expose_secret().as_ref();
    assert_eq!(token, "secret-token");

    cleanup_env_vars();
}

#[test]
fn test_missing_env_var_is_reported() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = format!("{SERVICES}bearer_token = \"${{TEST_DISTRIBUTOR_TOKEN}}\"\n");
    let temp_file = write_config(&toml_content);

    let err = load_config(temp_file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_DISTRIBUTOR_TOKEN"));
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("DISTRIBUTOR_APPLICATION_LOG_LEVEL", "trace");
    std::env::set_var("DISTRIBUTOR_PIPELINE_IGNORE_EXCEPTIONS", "true");
    std::env::set_var(
        "DISTRIBUTOR_PIPELINE_LOOKUP_RULES_TYPES",
        "ParticipantManagement, CohortDistribution",
    );
    std::env::set_var("DISTRIBUTOR_RETRY_MAX_ATTEMPTS", "7");

    let temp_file = write_config(SERVICES);
    let result = load_config(temp_file.path());
    cleanup_env_vars();

    let config = result.expect("Failed to load config");
    assert_eq!(config.application.log_level, "trace");
    assert!(config.pipeline.ignore_exceptions);
    assert_eq!(config.pipeline.lookup_rules_types.len(), 2);
    assert_eq!(config.retry.max_attempts, 7);
}

#[test]
fn test_bad_override_value_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("DISTRIBUTOR_APPLICATION_DRY_RUN", "perhaps");

    let temp_file = write_config(SERVICES);
    let result = load_config(temp_file.path());
    cleanup_env_vars();

    assert!(result.is_err());
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = format!(
        r#"
[application]
log_level = "invalid_level"
{SERVICES}"#
    );
    let temp_file = write_config(&toml_content);

    assert!(load_config(temp_file.path()).is_err());
}

#[test]
fn test_tls_verification_required_in_production() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let toml_content = format!("environment = \"production\"\n{SERVICES}tls_verify = false\n");
    let temp_file = write_config(&toml_content);

    let err = load_config(temp_file.path()).unwrap_err();
    assert!(err.to_string().contains("TLS"));
}
