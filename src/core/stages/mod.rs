//! Stage functions
//!
//! Each stage wraps exactly one external collaborator behind the same
//! `execute(ctx, input) -> Result<output>` contract. Stages are a closed set;
//! the orchestrator dispatches them by explicit state transition.
//!
//! Stages never touch another stage's output. The orchestrator owns the
//! [`PipelineContext`](crate::core::pipeline::PipelineContext) and writes
//! each output into its designated field.

pub mod allocate;
pub mod exception;
pub mod fetch;
pub mod persist;
pub mod reconcile;
pub mod transform;
pub mod validate;

pub use allocate::AllocateProviderStage;
pub use exception::{FlagExceptionStage, FlagReport, FlagRequest};
pub use fetch::FetchRecordStage;
pub use persist::{PersistRequest, PersistStage};
pub use reconcile::ReconcileStage;
pub use transform::TransformStage;
pub use validate::{LookupValidateStage, StaticValidateStage};

use crate::domain::{NhsNumber, Result, RunId, ScreeningId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    FetchRecord,
    Reconcile,
    AllocateProvider,
    StaticValidate,
    LookupValidate,
    Transform,
    Persist,
    FlagException,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::FetchRecord => "fetch_record",
            StageKind::Reconcile => "reconcile",
            StageKind::AllocateProvider => "allocate_provider",
            StageKind::StaticValidate => "static_validate",
            StageKind::LookupValidate => "lookup_validate",
            StageKind::Transform => "transform",
            StageKind::Persist => "persist",
            StageKind::FlagException => "flag_exception",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only identity of the run a stage executes in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageContext {
    pub run_id: RunId,
    pub nhs_number: NhsNumber,
    pub screening_id: ScreeningId,
    pub file_origin: String,
}

impl StageContext {
    pub fn new(nhs_number: NhsNumber, screening_id: ScreeningId, file_origin: impl Into<String>) -> Self {
        let file_origin = file_origin.into();
        Self {
            run_id: RunId::for_submission(&file_origin, &nhs_number, &screening_id),
            nhs_number,
            screening_id,
            file_origin,
        }
    }
}

/// One unit of the pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    const KIND: StageKind;

    async fn execute(&self, ctx: &StageContext, input: Self::Input) -> Result<Self::Output>;
}
