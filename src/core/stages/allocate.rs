//! AllocateProvider stage

use crate::core::allocation::ProviderAllocator;
use crate::core::stages::{Stage, StageContext, StageKind};
use crate::domain::{ParticipantRecord, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Allocates a service provider from the participant's postcode
///
/// A local decision over the allocation table. It is never retried.
pub struct AllocateProviderStage {
    allocator: Arc<ProviderAllocator>,
}

impl AllocateProviderStage {
    pub fn new(allocator: Arc<ProviderAllocator>) -> Self {
        Self { allocator }
    }
}

#[async_trait]
impl Stage for AllocateProviderStage {
    type Input = ParticipantRecord;
    type Output = String;

    const KIND: StageKind = StageKind::AllocateProvider;

    async fn execute(&self, ctx: &StageContext, record: ParticipantRecord) -> Result<String> {
        let provider = self
            .allocator
            .allocate(record.screening_acronym.as_deref(), record.postcode.as_deref())?;

        tracing::debug!(run_id = %ctx.run_id, service_provider = %provider, "Allocated service provider");
        Ok(provider)
    }
}
