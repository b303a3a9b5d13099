//! Pipeline states and terminal outcomes

use crate::core::stages::StageKind;
use crate::domain::{DistributionRecord, DistributorError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    Reconciling,
    Allocating,
    Validating,
    Deciding,
    Transforming,
    Persisting,
    Completed,
    ShortCircuited,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::Reconciling => "reconciling",
            PipelineState::Allocating => "allocating",
            PipelineState::Validating => "validating",
            PipelineState::Deciding => "deciding",
            PipelineState::Transforming => "transforming",
            PipelineState::Persisting => "persisting",
            PipelineState::Completed => "completed",
            PipelineState::ShortCircuited => "short_circuited",
            PipelineState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Completed | PipelineState::ShortCircuited | PipelineState::Failed
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run stopped early without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortCircuitReason {
    /// The participant already carries an active exception flag
    UnresolvedException,
    /// Validation raised at least one fatal violation
    FatalValidation,
}

impl fmt::Display for ShortCircuitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShortCircuitReason::UnresolvedException => write!(f, "unresolved exception"),
            ShortCircuitReason::FatalValidation => write!(f, "fatal validation"),
        }
    }
}

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFailure {
    /// Stage that raised the error, if any
    pub stage: Option<StageKind>,
    /// See [`DistributorError::kind`]
    pub kind: String,
    pub message: String,
}

impl PipelineFailure {
    pub fn new(stage: Option<StageKind>, error: &DistributorError) -> Self {
        Self {
            stage,
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == "cancelled"
    }
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{stage}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// The only results a run ever returns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Completed(DistributionRecord),
    ShortCircuited(ShortCircuitReason),
    Failed(PipelineFailure),
}

impl PipelineOutcome {
    pub fn state(&self) -> PipelineState {
        match self {
            PipelineOutcome::Completed(_) => PipelineState::Completed,
            PipelineOutcome::ShortCircuited(_) => PipelineState::ShortCircuited,
            PipelineOutcome::Failed(_) => PipelineState::Failed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineOutcome::Completed(_))
    }

    pub fn is_short_circuited(&self) -> bool {
        matches!(self, PipelineOutcome::ShortCircuited(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineOutcome::Failed(_))
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            PipelineOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}
