//! Transform service client

use super::client::ServiceClient;
use crate::adapters::traits::TransformService;
use crate::config::ServicesConfig;
use crate::domain::{DistributionRecord, Result, TransformRequest};
use async_trait::async_trait;
use reqwest::Method;

/// `POST {transform_url}` with a [`TransformRequest`]; an empty body means
/// the service produced nothing
pub struct HttpTransformService {
    client: ServiceClient,
}

impl HttpTransformService {
    pub fn new(config: &ServicesConfig) -> Result<Self> {
        Ok(Self {
            client: ServiceClient::new("transform", &config.transform_url, config)?,
        })
    }
}

#[async_trait]
impl TransformService for HttpTransformService {
    async fn transform(&self, request: &TransformRequest) -> Result<Option<DistributionRecord>> {
        let http_request = self.client.request(Method::POST, None).json(request);
        let response = self.client.send(http_request).await?;

        if !response.status().is_success() {
            return Err(self.client.status_error(response).await);
        }

        self.client.json_body(response).await
    }
}
