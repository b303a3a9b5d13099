//! Persist stage
//!
//! Writes the transformed record to the cohort distribution store. The
//! record keeps the insert timestamp of the distribution it replaces and is
//! marked extracted according to configuration.

use crate::adapters::traits::DistributionStore;
use crate::core::stages::{Stage, StageContext, StageKind};
use crate::domain::{DistributionRecord, DistributorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Record to persist and the insert timestamp it inherits
#[derive(Debug, Clone)]
pub struct PersistRequest {
    pub record: DistributionRecord,
    pub previous_insert: Option<DateTime<Utc>>,
}

impl PersistRequest {
    pub fn new(record: DistributionRecord, previous: &DistributionRecord) -> Self {
        Self {
            record,
            previous_insert: previous.record_insert_date_time,
        }
    }
}

pub struct PersistStage {
    store: Arc<dyn DistributionStore>,
    extracted: bool,
    dry_run: bool,
}

impl PersistStage {
    pub fn new(store: Arc<dyn DistributionStore>, extracted: bool, dry_run: bool) -> Self {
        Self {
            store,
            extracted,
            dry_run,
        }
    }
}

#[async_trait]
impl Stage for PersistStage {
    type Input = PersistRequest;
    type Output = DistributionRecord;

    const KIND: StageKind = StageKind::Persist;

    async fn execute(&self, ctx: &StageContext, request: PersistRequest) -> Result<DistributionRecord> {
        let now = Utc::now();
        let mut record = request.record;
        record.record_insert_date_time = request.previous_insert.or(Some(now));
        record.record_update_date_time = Some(now);
        record.extracted = self.extracted;

        if self.dry_run {
            tracing::info!(run_id = %ctx.run_id, "Dry run: skipping distribution write");
            return Ok(record);
        }

        if !self.store.add_distribution(&record).await? {
            return Err(DistributorError::Persist(format!(
                "distribution store rejected record for participant {}",
                ctx.nhs_number
            )));
        }

        tracing::info!(
            run_id = %ctx.run_id,
            extracted = record.extracted,
            "Distribution record persisted"
        );
        Ok(record)
    }
}
