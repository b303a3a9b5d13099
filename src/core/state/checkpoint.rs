//! Checkpoint model for durable pipeline runs
//!
//! A checkpoint is written after every state transition of a run. It carries
//! the serialised [`PipelineContext`] so a restarted process can resume the
//! run without repeating stages whose output is already recorded.

use crate::core::pipeline::{PipelineContext, PipelineOutcome, PipelineState};
use crate::domain::{Result, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Checkpoint status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    /// Run is in progress (or was interrupted)
    InProgress,
    /// Run completed and its outcome is recorded
    Completed,
    /// Run stopped early without an error
    ShortCircuited,
    /// Run failed with an error
    Failed,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::InProgress => "in_progress",
            CheckpointStatus::Completed => "completed",
            CheckpointStatus::ShortCircuited => "short_circuited",
            CheckpointStatus::Failed => "failed",
        }
    }

    /// Whether a run with this status picks up where it left off
    pub fn is_resumable(&self) -> bool {
        matches!(self, CheckpointStatus::InProgress | CheckpointStatus::Failed)
    }
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckpointStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "in_progress" => Ok(CheckpointStatus::InProgress),
            "completed" => Ok(CheckpointStatus::Completed),
            "short_circuited" => Ok(CheckpointStatus::ShortCircuited),
            "failed" => Ok(CheckpointStatus::Failed),
            other => Err(format!("unknown checkpoint status '{other}'")),
        }
    }
}

/// Durable snapshot of one pipeline run
///
/// # Examples
///
/// ```
/// use cohort_distributor::core::pipeline::{PipelineContext, PipelineState};
/// use cohort_distributor::core::state::{CheckpointBuilder, CheckpointStatus};
/// use cohort_distributor::domain::{NhsNumber, ParticipantRecord, RecordType, RunId, ScreeningId};
///
/// let record = ParticipantRecord::new(
///     NhsNumber::new("9990001112").unwrap(),
///     ScreeningId::new("1").unwrap(),
///     RecordType::New,
/// );
/// let checkpoint = CheckpointBuilder::new(
///     RunId::from_raw("file_9990001112_1"),
///     PipelineContext::new(record, "file"),
/// )
/// .state(PipelineState::Validating)
/// .build()
/// .unwrap();
///
/// assert_eq!(checkpoint.status, CheckpointStatus::InProgress);
/// assert!(checkpoint.verify_checksum().unwrap());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub run_id: RunId,

    /// Last state the run entered
    pub state: PipelineState,

    pub status: CheckpointStatus,

    pub context: PipelineContext,

    /// Terminal outcome, once there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PipelineOutcome>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// SHA-256 over the run id, state, status, context and outcome
    pub checksum: String,
}

impl Checkpoint {
    /// Compute the integrity checksum of the checkpoint payload
    pub fn compute_checksum(&self) -> Result<String> {
        let payload = serde_json::to_value(ChecksumPayload {
            run_id: &self.run_id,
            state: self.state,
            status: self.status,
            context: &self.context,
            outcome: self.outcome.as_ref(),
        })?;
        let normalized = serde_json::to_string(&normalize_json(&payload))?;

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Recompute and store the checksum
    pub fn seal(&mut self) -> Result<()> {
        self.checksum = self.compute_checksum()?;
        Ok(())
    }

    /// Whether the stored checksum matches the payload
    pub fn verify_checksum(&self) -> Result<bool> {
        Ok(self.compute_checksum()? == self.checksum)
    }

    /// Record a transition and reseal
    pub fn advance(
        &mut self,
        state: PipelineState,
        context: PipelineContext,
        outcome: Option<PipelineOutcome>,
    ) -> Result<()> {
        self.state = state;
        self.status = match &outcome {
            None => CheckpointStatus::InProgress,
            Some(PipelineOutcome::Completed(_)) => CheckpointStatus::Completed,
            Some(PipelineOutcome::ShortCircuited(_)) => CheckpointStatus::ShortCircuited,
            Some(PipelineOutcome::Failed(f)) if f.is_cancelled() => CheckpointStatus::InProgress,
            Some(PipelineOutcome::Failed(_)) => CheckpointStatus::Failed,
        };
        self.context = context;
        self.outcome = outcome;
        self.updated_at = Utc::now();
        self.seal()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChecksumPayload<'a> {
    run_id: &'a RunId,
    state: PipelineState,
    status: CheckpointStatus,
    context: &'a PipelineContext,
    outcome: Option<&'a PipelineOutcome>,
}

/// Sort object keys recursively so equal payloads hash equally
fn normalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), normalize_json(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_json).collect()),
        _ => value.clone(),
    }
}

/// Builder for creating Checkpoint instances
pub struct CheckpointBuilder {
    run_id: RunId,
    context: PipelineContext,
    state: PipelineState,
    outcome: Option<PipelineOutcome>,
}

impl CheckpointBuilder {
    pub fn new(run_id: RunId, context: PipelineContext) -> Self {
        Self {
            run_id,
            context,
            state: PipelineState::Start,
            outcome: None,
        }
    }

    pub fn state(mut self, state: PipelineState) -> Self {
        self.state = state;
        self
    }

    pub fn outcome(mut self, outcome: PipelineOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Build and seal the checkpoint
    pub fn build(self) -> Result<Checkpoint> {
        let now = Utc::now();
        let mut checkpoint = Checkpoint {
            run_id: self.run_id,
            state: self.state,
            status: CheckpointStatus::InProgress,
            context: self.context.clone(),
            outcome: None,
            created_at: now,
            updated_at: now,
            checksum: String::new(),
        };
        checkpoint.advance(self.state, self.context, self.outcome)?;
        checkpoint.created_at = checkpoint.updated_at;
        Ok(checkpoint)
    }
}
