//! Reconcile stage
//!
//! Loads the most recent distribution record for the subject. A subject that
//! was never distributed reconciles to [`DistributionRecord::sentinel`].

use crate::adapters::traits::DistributionStore;
use crate::core::stages::{Stage, StageContext, StageKind};
use crate::domain::{DistributionRecord, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub struct ReconcileStage {
    store: Arc<dyn DistributionStore>,
}

impl ReconcileStage {
    pub fn new(store: Arc<dyn DistributionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for ReconcileStage {
    type Input = ();
    type Output = DistributionRecord;

    const KIND: StageKind = StageKind::Reconcile;

    async fn execute(&self, ctx: &StageContext, _input: ()) -> Result<DistributionRecord> {
        match self.store.latest_distribution(&ctx.nhs_number).await? {
            Some(previous) => {
                tracing::debug!(
                    run_id = %ctx.run_id,
                    cohort_distribution_id = ?previous.cohort_distribution_id,
                    "Reconciled against previous distribution"
                );
                Ok(previous)
            }
            None => {
                tracing::debug!(run_id = %ctx.run_id, "No previous distribution, using sentinel");
                Ok(DistributionRecord::sentinel())
            }
        }
    }
}
