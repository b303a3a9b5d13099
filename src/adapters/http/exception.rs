//! Exception sink client
//!
//! One `POST` per violation, one per system failure. The sink call counts as
//! accepted only if every post was accepted.

use super::client::ServiceClient;
use crate::adapters::traits::ExceptionSink;
use crate::config::ServicesConfig;
use crate::domain::{
    ParticipantRecord, Result, SystemFailure, Violation, SYSTEM_EXCEPTION_CATEGORY,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Serialize;

/// Category used for rule violations
const VALIDATION_EXCEPTION_CATEGORY: u16 = 3;

/// Wire format of a single exception entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExceptionEntry {
    pub nhs_number: String,
    pub file_name: String,
    pub screening_name: Option<String>,
    pub rule_id: i64,
    pub rule_description: String,
    pub category: u16,
    pub fatal: u8,
    pub date_created: DateTime<Utc>,
    pub error_record: String,
}

impl ExceptionEntry {
    fn for_violation(violation: &Violation, record: &ParticipantRecord, file_origin: &str) -> Self {
        Self {
            nhs_number: record.nhs_number.to_string(),
            file_name: file_origin.to_string(),
            screening_name: record.screening_name.clone(),
            rule_id: i64::from(violation.rule_id),
            rule_description: violation.description.clone(),
            category: VALIDATION_EXCEPTION_CATEGORY,
            fatal: u8::from(violation.is_fatal()),
            date_created: Utc::now(),
            error_record: serde_json::to_string(record).unwrap_or_default(),
        }
    }

    fn for_system_failure(
        failure: &SystemFailure,
        record: &ParticipantRecord,
        file_origin: &str,
    ) -> Self {
        Self {
            nhs_number: record.nhs_number.to_string(),
            file_name: file_origin.to_string(),
            screening_name: record.screening_name.clone(),
            rule_id: 0,
            rule_description: format!("[{}] {}: {}", failure.stage, failure.kind, failure.message),
            category: SYSTEM_EXCEPTION_CATEGORY,
            fatal: 1,
            date_created: failure.occurred_at,
            error_record: serde_json::to_string(record).unwrap_or_default(),
        }
    }
}

pub struct HttpExceptionSink {
    client: ServiceClient,
}

impl HttpExceptionSink {
    pub fn new(config: &ServicesConfig) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::new("exception-sink", &config.exception_url, config)?,
        })
    }

    async fn post(&self, entry: &ExceptionEntry) -> Result<bool> {
        let request = self.client.request(Method::POST, None).json(entry);
        let response = self.client.send(request).await?;
        self.client.write_accepted(response).await
    }
}

#[async_trait]
impl ExceptionSink for HttpExceptionSink {
    async fn log_validation_exception(
        &self,
        violations: &[Violation],
        record: &ParticipantRecord,
        file_origin: &str,
    ) -> Result<bool> {
        let mut all_accepted = true;
        for violation in violations {
            let entry = ExceptionEntry::for_violation(violation, record, file_origin);
            if !self.post(&entry).await? {
                tracing::warn!(
                    nhs_number = %record.nhs_number,
                    rule_id = violation.rule_id,
                    "Exception sink rejected validation exception"
                );
                all_accepted = false;
            }
        }
        Ok(all_accepted)
    }

    async fn log_system_exception(
        &self,
        failure: &SystemFailure,
        record: &ParticipantRecord,
        file_origin: &str,
    ) -> Result<bool> {
        let entry = ExceptionEntry::for_system_failure(failure, record, file_origin);
        self.post(&entry).await
    }
}
