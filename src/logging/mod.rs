//! Logging and observability
//!
//! Structured `tracing` logging with:
//! - JSON-formatted file logs with rotation
//! - Human-readable console output
//! - Configurable log levels (`RUST_LOG` wins when set)
//!
//! Stage and retry events go through the macros below so every run logs the
//! same field names.
//!
//! # Example
//!
//! ```no_run
//! use cohort_distributor::logging::init_logging;
//! use cohort_distributor::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a pipeline stage
///
/// # Example
///
/// ```no_run
/// use cohort_distributor::log_stage_start;
///
/// log_stage_start!("run-1", "lookup_validate");
/// ```
#[macro_export]
macro_rules! log_stage_start {
    ($run_id:expr, $stage:expr) => {
        tracing::debug!(
            run_id = %$run_id,
            stage = %$stage,
            "Stage started"
        );
    };
}

/// Log the completion of a pipeline stage
///
/// # Example
///
/// ```no_run
/// use cohort_distributor::log_stage_complete;
/// use std::time::Duration;
///
/// log_stage_complete!("run-1", "transform", Duration::from_millis(12));
/// ```
#[macro_export]
macro_rules! log_stage_complete {
    ($run_id:expr, $stage:expr, $duration:expr) => {
        tracing::debug!(
            run_id = %$run_id,
            stage = %$stage,
            duration_ms = $duration.as_millis() as u64,
            "Stage completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use cohort_distributor::log_error_with_context;
/// use cohort_distributor::domain::DistributorError;
///
/// let error = DistributorError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use cohort_distributor::log_retry_attempt;
///
/// log_retry_attempt!(2, 3, "lookup_validate", "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $operation:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            operation = %$operation,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
