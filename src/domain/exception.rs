//! System exception entries
//!
//! The payload handed to the exception sink when a run fails for a reason
//! other than a rule violation.

use crate::domain::errors::DistributorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exception category the sink files system failures under
pub const SYSTEM_EXCEPTION_CATEGORY: u16 = 99;

/// A failed run, described for the exception sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemFailure {
    /// Stage that raised the error
    pub stage: String,
    /// Error category, see [`DistributorError::kind`]
    pub kind: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl SystemFailure {
    pub fn new(stage: impl Into<String>, error: &DistributorError) -> Self {
        Self {
            stage: stage.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_failure_from_error() {
        let err = DistributorError::EmptyTransform("9990001112".to_string());
        let failure = SystemFailure::new("transform", &err);

        assert_eq!(failure.stage, "transform");
        assert_eq!(failure.kind, "empty_transform");
        assert!(failure.message.contains("9990001112"));
    }
}
