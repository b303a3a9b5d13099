//! Shared HTTP plumbing for the service adapters
//!
//! One `ServiceClient` per collaborator endpoint. It owns the reqwest client,
//! attaches the bearer token, and maps transport failures and HTTP status
//! codes onto [`ServiceError`] so the retry policy can tell transient failures
//! from permanent ones.

use crate::config::{SecretString, ServicesConfig};
use crate::domain::{DistributorError, Result, ServiceError};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// HTTP client bound to one collaborator endpoint
#[derive(Clone)]
pub struct ServiceClient {
    name: &'static str,
    base_url: String,
    client: Client,
    bearer_token: Option<SecretString>,
}

impl ServiceClient {
    /// Build a client for `base_url` using the shared service settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the underlying HTTP client cannot be built.
    pub fn new(name: &'static str, base_url: &str, config: &ServicesConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(10)));

        if !config.tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            DistributorError::Configuration(format!("Failed to build HTTP client for {name}: {e}"))
        })?;

        Ok(Self {
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            bearer_token: config.bearer_token.clone(),
        })
    }

    /// Collaborator name used in errors and logs
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Start a request against the base URL, or `{base_url}/{segment}`
    pub fn request(&self, method: Method, segment: Option<&str>) -> RequestBuilder {
        let url = match segment {
            Some(segment) => format!("{}/{}", self.base_url, segment),
            None => self.base_url.clone(),
        };

        let mut request = self.client.request(method, url);
        if let Some(token) = &self.bearer_token {
            let token: &str = token.expose_secret().as_ref();
            request = request.bearer_auth(token);
        }
        request
    }

    /// Send a request, mapping transport failures
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| {
            let message = e.to_string();
            let err = if e.is_timeout() {
                ServiceError::Timeout {
                    service: self.name.to_string(),
                    message,
                }
            } else {
                ServiceError::ConnectionFailed {
                    service: self.name.to_string(),
                    message,
                }
            };
            err.into()
        })
    }

    /// Turn a non-success response into a classified error
    pub async fn status_error(&self, response: Response) -> DistributorError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ServiceError::from_status(self.name, status.as_u16(), body).into()
    }

    /// Decode a JSON body, treating an empty body as `None`
    pub async fn json_body<T: DeserializeOwned>(&self, response: Response) -> Result<Option<T>> {
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = response.text().await.map_err(|e| ServiceError::InvalidResponse {
            service: self.name.to_string(),
            message: e.to_string(),
        })?;

        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text).map(Some).map_err(|e| {
            ServiceError::InvalidResponse {
                service: self.name.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Outcome of a write: success is `true`, 4xx is a rejection (`false`),
    /// anything else is an error
    pub async fn write_accepted(&self, response: Response) -> Result<bool> {
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                service = self.name,
                status = status.as_u16(),
                body = %body,
                "Write rejected"
            );
            return Ok(false);
        }
        Err(self.status_error(response).await)
    }
}
