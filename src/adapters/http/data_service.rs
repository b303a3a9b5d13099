//! Participant management and cohort distribution data services
//!
//! Both services expose the same shape: `GET {base}?query=<filter>` returns a
//! JSON array (404 when nothing matches), `POST {base}` adds a record and
//! `PUT {base}/{id}` updates one.

use super::client::ServiceClient;
use crate::adapters::traits::{DistributionStore, ParticipantStore};
use crate::config::ServicesConfig;
use crate::domain::{DistributionRecord, NhsNumber, ParticipantRecord, Result, ScreeningId};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

async fn get_by_filter<T: DeserializeOwned>(client: &ServiceClient, filter: &str) -> Result<Vec<T>> {
    let request = client
        .request(Method::GET, None)
        .query(&[("query", filter)]);
    let response = client.send(request).await?;

    if response.status() == StatusCode::NOT_FOUND {
        return Ok(Vec::new());
    }
    if !response.status().is_success() {
        return Err(client.status_error(response).await);
    }

    Ok(client.json_body::<Vec<T>>(response).await?.unwrap_or_default())
}

/// HTTP participant management store
pub struct HttpParticipantStore {
    client: ServiceClient,
}

impl HttpParticipantStore {
    pub fn new(config: &ServicesConfig) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::new(
                "participant-management",
                &config.participant_management_url,
                config,
            )?,
        })
    }
}

#[async_trait]
impl ParticipantStore for HttpParticipantStore {
    async fn fetch_participant(
        &self,
        nhs_number: &NhsNumber,
        screening_id: &ScreeningId,
    ) -> Result<Option<ParticipantRecord>> {
        let filter = format!("NhsNumber == \"{nhs_number}\" && ScreeningId == \"{screening_id}\"");
        let mut records: Vec<ParticipantRecord> = get_by_filter(&self.client, &filter).await?;

        if records.len() > 1 {
            tracing::warn!(
                nhs_number = %nhs_number,
                screening_id = %screening_id,
                count = records.len(),
                "Multiple participants matched, using the first"
            );
        }

        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }

    async fn update_participant(&self, record: &ParticipantRecord) -> Result<bool> {
        let id = record
            .participant_id
            .clone()
            .unwrap_or_else(|| record.nhs_number.to_string());
        let request = self.client.request(Method::PUT, Some(&id)).json(record);
        let response = self.client.send(request).await?;
        self.client.write_accepted(response).await
    }
}

/// HTTP cohort distribution store
pub struct HttpDistributionStore {
    client: ServiceClient,
}

impl HttpDistributionStore {
    pub fn new(config: &ServicesConfig) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::new(
                "cohort-distribution",
                &config.cohort_distribution_url,
                config,
            )?,
        })
    }
}

#[async_trait]
impl DistributionStore for HttpDistributionStore {
    async fn latest_distribution(
        &self,
        nhs_number: &NhsNumber,
    ) -> Result<Option<DistributionRecord>> {
        let filter = format!("NhsNumber == \"{nhs_number}\"");
        let records: Vec<DistributionRecord> = get_by_filter(&self.client, &filter).await?;
        Ok(DistributionRecord::latest(records))
    }

    async fn add_distribution(&self, record: &DistributionRecord) -> Result<bool> {
        let request = self.client.request(Method::POST, None).json(record);
        let response = self.client.send(request).await?;
        self.client.write_accepted(response).await
    }
}
