//! Transform stage

use crate::adapters::traits::TransformService;
use crate::core::stages::{Stage, StageContext, StageKind};
use crate::domain::{DistributionRecord, DistributorError, Result, TransformRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces the distribution record from the validated participant and the
/// reconciled previous distribution
///
/// An empty result from the transform service is a failure of the run, not a
/// short-circuit.
pub struct TransformStage {
    service: Arc<dyn TransformService>,
}

impl TransformStage {
    pub fn new(service: Arc<dyn TransformService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Stage for TransformStage {
    type Input = TransformRequest;
    type Output = DistributionRecord;

    const KIND: StageKind = StageKind::Transform;

    async fn execute(&self, ctx: &StageContext, request: TransformRequest) -> Result<DistributionRecord> {
        let transformed = self
            .service
            .transform(&request)
            .await?
            .ok_or_else(|| DistributorError::EmptyTransform(ctx.nhs_number.to_string()))?;

        tracing::debug!(run_id = %ctx.run_id, "Participant transformed");
        Ok(transformed)
    }
}
