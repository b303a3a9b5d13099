//! FetchRecord stage
//!
//! Loads the authoritative participant from the participant management
//! store and stamps it with the configured screening programme.

use crate::adapters::traits::ParticipantStore;
use crate::core::stages::{Stage, StageContext, StageKind};
use crate::domain::{DistributorError, ParticipantRecord, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub struct FetchRecordStage {
    store: Arc<dyn ParticipantStore>,
    screening_name: String,
    screening_acronym: String,
}

impl FetchRecordStage {
    pub fn new(
        store: Arc<dyn ParticipantStore>,
        screening_name: impl Into<String>,
        screening_acronym: impl Into<String>,
    ) -> Self {
        Self {
            store,
            screening_name: screening_name.into(),
            screening_acronym: screening_acronym.into(),
        }
    }
}

#[async_trait]
impl Stage for FetchRecordStage {
    type Input = ();
    type Output = ParticipantRecord;

    const KIND: StageKind = StageKind::FetchRecord;

    async fn execute(&self, ctx: &StageContext, _input: ()) -> Result<ParticipantRecord> {
        let record = self
            .store
            .fetch_participant(&ctx.nhs_number, &ctx.screening_id)
            .await?
            .ok_or_else(|| {
                DistributorError::NotFound(format!(
                    "participant {} in screening programme {}",
                    ctx.nhs_number, ctx.screening_id
                ))
            })?;

        tracing::debug!(
            run_id = %ctx.run_id,
            participant_id = ?record.participant_id,
            "Fetched participant record"
        );

        Ok(record.with_screening(&self.screening_name, &self.screening_acronym))
    }
}
