//! Collaborator traits
//!
//! The narrow contracts the pipeline consumes. Each stage depends on exactly
//! one of these; HTTP implementations live in [`crate::adapters::http`] and
//! tests substitute recording fakes.

use crate::domain::{
    DistributionRecord, NhsNumber, ParticipantRecord, Result, ScreeningId, SystemFailure,
    TransformRequest, ValidationOutcome, ValidationRequest, Violation,
};
use async_trait::async_trait;

/// Participant management data service
#[async_trait]
pub trait ParticipantStore: Send + Sync {
    /// Load the authoritative record for a subject in a screening programme
    ///
    /// Returns `Ok(None)` when no such participant exists.
    async fn fetch_participant(
        &self,
        nhs_number: &NhsNumber,
        screening_id: &ScreeningId,
    ) -> Result<Option<ParticipantRecord>>;

    /// Write back a participant. `Ok(false)` means the store rejected it.
    async fn update_participant(&self, record: &ParticipantRecord) -> Result<bool>;
}

/// Cohort distribution data service
#[async_trait]
pub trait DistributionStore: Send + Sync {
    /// The most recently distributed record for a subject, if any
    async fn latest_distribution(&self, nhs_number: &NhsNumber)
        -> Result<Option<DistributionRecord>>;

    /// Add a distribution record. `Ok(false)` means the store rejected it.
    async fn add_distribution(&self, record: &DistributionRecord) -> Result<bool>;
}

/// A validation rule service (static or lookup)
#[async_trait]
pub trait RuleService: Send + Sync {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationOutcome>;
}

/// Transform service
#[async_trait]
pub trait TransformService: Send + Sync {
    /// `Ok(None)` when the service produced no record
    async fn transform(&self, request: &TransformRequest) -> Result<Option<DistributionRecord>>;
}

/// Exception sink
#[async_trait]
pub trait ExceptionSink: Send + Sync {
    /// Record rule violations raised against a participant
    async fn log_validation_exception(
        &self,
        violations: &[Violation],
        record: &ParticipantRecord,
        file_origin: &str,
    ) -> Result<bool>;

    /// Record an unexpected failure of a run
    async fn log_system_exception(
        &self,
        failure: &SystemFailure,
        record: &ParticipantRecord,
        file_origin: &str,
    ) -> Result<bool>;
}
