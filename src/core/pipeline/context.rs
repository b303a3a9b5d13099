//! Per-run pipeline context
//!
//! Built up one field at a time as stages complete. Every stage output field
//! is written at most once; a second write is a state error. The context is
//! serialisable so a checkpoint can carry it across a restart.

use crate::domain::{
    DistributionRecord, DistributorError, ParticipantRecord, Result, ValidationOutcome,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineContext {
    record: ParticipantRecord,
    file_origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fetched_record: Option<ParticipantRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_distribution: Option<DistributionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allocated_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aggregated_validation: Option<ValidationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transformed_record: Option<DistributionRecord>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<()> {
    if slot.is_some() {
        return Err(DistributorError::State(format!(
            "pipeline context field '{field}' is already set"
        )));
    }
    *slot = Some(value);
    Ok(())
}

impl PipelineContext {
    pub fn new(record: ParticipantRecord, file_origin: impl Into<String>) -> Self {
        Self {
            record,
            file_origin: file_origin.into(),
            fetched_record: None,
            previous_distribution: None,
            allocated_provider: None,
            aggregated_validation: None,
            transformed_record: None,
        }
    }

    /// The inbound record as submitted
    pub fn record(&self) -> &ParticipantRecord {
        &self.record
    }

    pub fn file_origin(&self) -> &str {
        &self.file_origin
    }

    pub fn fetched_record(&self) -> Option<&ParticipantRecord> {
        self.fetched_record.as_ref()
    }

    pub fn previous_distribution(&self) -> Option<&DistributionRecord> {
        self.previous_distribution.as_ref()
    }

    pub fn allocated_provider(&self) -> Option<&str> {
        self.allocated_provider.as_deref()
    }

    pub fn aggregated_validation(&self) -> Option<&ValidationOutcome> {
        self.aggregated_validation.as_ref()
    }

    pub fn transformed_record(&self) -> Option<&DistributionRecord> {
        self.transformed_record.as_ref()
    }

    /// The most authoritative participant known so far
    pub fn participant(&self) -> &ParticipantRecord {
        self.fetched_record.as_ref().unwrap_or(&self.record)
    }

    /// Whether either the inbound or the stored record carries an active flag
    pub fn has_unresolved_exception(&self) -> bool {
        self.record.exception_flag.is_active()
            || self
                .fetched_record
                .as_ref()
                .is_some_and(|r| r.exception_flag.is_active())
    }

    /// Drop the outputs of the read-only stages that run before validation
    ///
    /// Only valid while no validation outcome is recorded; afterwards the
    /// flagged violations depend on these reads.
    pub fn discard_unvalidated_reads(&mut self) {
        if self.aggregated_validation.is_some() {
            return;
        }
        self.fetched_record = None;
        self.previous_distribution = None;
        self.allocated_provider = None;
    }

    pub fn set_fetched_record(&mut self, record: ParticipantRecord) -> Result<()> {
        set_once(&mut self.fetched_record, record, "fetchedRecord")
    }

    pub fn set_previous_distribution(&mut self, previous: DistributionRecord) -> Result<()> {
        set_once(&mut self.previous_distribution, previous, "previousDistribution")
    }

    pub fn set_allocated_provider(&mut self, provider: String) -> Result<()> {
        set_once(&mut self.allocated_provider, provider, "allocatedProvider")
    }

    pub fn set_aggregated_validation(&mut self, outcome: ValidationOutcome) -> Result<()> {
        set_once(&mut self.aggregated_validation, outcome, "aggregatedValidation")
    }

    pub fn set_transformed_record(&mut self, record: DistributionRecord) -> Result<()> {
        set_once(&mut self.transformed_record, record, "transformedRecord")
    }
}
