//! Validation rule service client
//!
//! Static and lookup validation share one wire shape: `POST` the
//! [`ValidationRequest`], receive `{ "violations": [...] }`. A 204 or an empty
//! body means no rule fired.

use super::client::ServiceClient;
use crate::adapters::traits::RuleService;
use crate::config::ServicesConfig;
use crate::domain::{Result, ValidationOutcome, ValidationRequest};
use async_trait::async_trait;
use reqwest::Method;

pub struct HttpRuleService {
    client: ServiceClient,
}

impl HttpRuleService {
    /// Client for the static validation service
    pub fn static_rules(config: &ServicesConfig) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::new("static-validation", &config.static_validation_url, config)?,
        })
    }

    /// Client for the lookup validation service
    pub fn lookup_rules(config: &ServicesConfig) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::new("lookup-validation", &config.lookup_validation_url, config)?,
        })
    }
}

#[async_trait]
impl RuleService for HttpRuleService {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationOutcome> {
        let http_request = self.client.request(Method::POST, None).json(request);
        let response = self.client.send(http_request).await?;

        if !response.status().is_success() {
            return Err(self.client.status_error(response).await);
        }

        let outcome = self
            .client
            .json_body::<ValidationOutcome>(response)
            .await?
            .unwrap_or_default();

        tracing::debug!(
            service = self.client.name(),
            nhs_number = %request.participant.nhs_number,
            rules_type = ?request.rules_type,
            violations = outcome.violations().len(),
            fatal = outcome.is_fatal(),
            "Validation response received"
        );

        Ok(outcome)
    }
}
