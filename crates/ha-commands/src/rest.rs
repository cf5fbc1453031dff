//! Home Assistant REST API client for service calls

use std::time::Duration;

use async_trait::async_trait;
use ha_core::ServiceCall;
use reqwest::{header, Client};
use tracing::trace;

use crate::dispatcher::{ServiceCallError, ServiceCaller, ServiceResponse};

/// Calls services through `POST /api/services/{domain}/{service}`
///
/// Authenticates with a long-lived access token sent as a bearer token.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Create a client for the Home Assistant instance at `base_url`
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceCallError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// URL of a service endpoint
    pub fn service_url(&self, domain: &str, service: &str) -> String {
        format!("{}/api/services/{}/{}", self.base_url, domain, service)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ServiceCaller for RestClient {
    async fn call_service(&self, call: &ServiceCall) -> Result<ServiceResponse, ServiceCallError> {
        let url = self.service_url(&call.domain, &call.service);
        trace!(url = %url, "POST service call");

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&call.service_data)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(ServiceResponse { status, body })
    }
}
