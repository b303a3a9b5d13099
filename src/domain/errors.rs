//! Domain error types
//!
//! This module defines the error hierarchy for the distributor. All errors are
//! domain-specific and don't expose third-party types.
//!
//! Expected business outcomes (rule violations) are *not* errors: they travel
//! as [`crate::domain::ValidationOutcome`] values. Only unexpected failures use
//! this channel.

use thiserror::Error;

/// Main distributor error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum DistributorError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failure reported by (or while talking to) an external collaborator
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// A record that must exist was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input that can never succeed, regardless of retries
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Service provider allocation failed
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// The transform service returned nothing for a validated record
    #[error("Transformation returned an empty result for participant {0}")]
    EmptyTransform(String),

    /// The distribution store rejected the write
    #[error("Persist error: {0}")]
    Persist(String),

    /// Checkpoint / pipeline state errors
    #[error("State management error: {0}")]
    State(String),

    /// The run was cancelled at a stage boundary
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// An error wrapped with caller-supplied context
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<DistributorError>,
    },

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl DistributorError {
    /// Whether the failure is worth retrying.
    ///
    /// Network failures, timeouts, throttling and 5xx responses are transient.
    /// Everything else (4xx, malformed payloads, business failures) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            DistributorError::Service(err) => err.is_transient(),
            DistributorError::Context { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Whether this error came from a cooperative cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            DistributorError::Cancelled(_) => true,
            DistributorError::Context { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Short machine-readable category used in exception entries and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            DistributorError::Configuration(_) => "configuration",
            DistributorError::Service(_) => "service",
            DistributorError::NotFound(_) => "not_found",
            DistributorError::MalformedInput(_) => "malformed_input",
            DistributorError::Allocation(_) => "allocation",
            DistributorError::EmptyTransform(_) => "empty_transform",
            DistributorError::Persist(_) => "persist",
            DistributorError::State(_) => "state",
            DistributorError::Cancelled(_) => "cancelled",
            DistributorError::Serialization(_) => "serialization",
            DistributorError::Io(_) => "io",
            DistributorError::Context { source, .. } => source.kind(),
            DistributorError::Other(_) => "other",
        }
    }
}

/// Collaborator (data service, rule service, transform service, exception
/// sink) errors.
///
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Failed to reach the service
    #[error("Failed to connect to {service}: {message}")]
    ConnectionFailed { service: String, message: String },

    /// The request (or a single attempt of it) timed out
    #[error("Request to {service} timed out: {message}")]
    Timeout { service: String, message: String },

    /// Server error (5xx)
    #[error("{service} server error: {status} - {message}")]
    ServerError {
        service: String,
        status: u16,
        message: String,
    },

    /// Client error (4xx)
    #[error("{service} client error: {status} - {message}")]
    ClientError {
        service: String,
        status: u16,
        message: String,
    },

    /// Rate limit exceeded (429)
    #[error("{service} rate limit exceeded: {message}")]
    RateLimited { service: String, message: String },

    /// Response could not be interpreted
    #[error("Invalid response from {service}: {message}")]
    InvalidResponse { service: String, message: String },
}

impl ServiceError {
    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::ConnectionFailed { .. }
                | ServiceError::Timeout { .. }
                | ServiceError::ServerError { .. }
                | ServiceError::RateLimited { .. }
        )
    }

    /// Name of the collaborator that produced the error
    pub fn service(&self) -> &str {
        match self {
            ServiceError::ConnectionFailed { service, .. }
            | ServiceError::Timeout { service, .. }
            | ServiceError::ServerError { service, .. }
            | ServiceError::ClientError { service, .. }
            | ServiceError::RateLimited { service, .. }
            | ServiceError::InvalidResponse { service, .. } => service,
        }
    }

    /// Map an HTTP status and body onto the error taxonomy
    pub fn from_status(service: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let service = service.into();
        let message = message.into();
        match status {
            429 => ServiceError::RateLimited { service, message },
            500..=599 => ServiceError::ServerError {
                service,
                status,
                message,
            },
            _ => ServiceError::ClientError {
                service,
                status,
                message,
            },
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for DistributorError {
    fn from(err: std::io::Error) -> Self {
        DistributorError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for DistributorError {
    fn from(err: serde_json::Error) -> Self {
        DistributorError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for DistributorError {
    fn from(err: toml::de::Error) -> Self {
        DistributorError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_distributor_error_display() {
        let err = DistributorError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_service_error_conversion() {
        let service_err = ServiceError::ConnectionFailed {
            service: "lookup-validation".to_string(),
            message: "refused".to_string(),
        };
        let err: DistributorError = service_err.into();
        assert!(matches!(err, DistributorError::Service(_)));
        assert!(err.is_transient());
    }

    #[test_case(500, true ; "internal server error")]
    #[test_case(503, true ; "service unavailable")]
    #[test_case(429, true ; "throttled")]
    #[test_case(400, false ; "bad request")]
    #[test_case(404, false ; "not found")]
    fn test_status_classification(status: u16, transient: bool) {
        let err = ServiceError::from_status("static-validation", status, "body");
        assert_eq!(err.is_transient(), transient);
        assert_eq!(err.service(), "static-validation");
    }

    #[test]
    fn test_non_service_errors_are_not_transient() {
        assert!(!DistributorError::MalformedInput("bad".to_string()).is_transient());
        assert!(!DistributorError::EmptyTransform("1".to_string()).is_transient());
        assert!(!DistributorError::Allocation("no postcode".to_string()).is_transient());
    }

    #[test]
    fn test_cancelled_flag() {
        assert!(DistributorError::Cancelled("shutdown".to_string()).is_cancelled());
        assert!(!DistributorError::Other("x".to_string()).is_cancelled());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: DistributorError = io_err.into();
        assert!(matches!(err, DistributorError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: DistributorError = json_err.into();
        assert!(matches!(err, DistributorError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: DistributorError = toml_err.into();
        assert!(matches!(err, DistributorError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(DistributorError::Persist("x".into()).kind(), "persist");
        assert_eq!(DistributorError::EmptyTransform("x".into()).kind(), "empty_transform");
    }
}
