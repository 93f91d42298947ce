//! Identity provider discovery (OpenID Connect configuration)

use rsbroker_core::validation::get_string;
use rsbroker_core::{BrokerError, BrokerResult};
use serde_json::Value;
use tracing::{debug, info};

use super::transport::UpstreamClient;

/// OpenID configuration document of the identity provider
#[derive(Debug, Clone)]
pub struct IdentityConfiguration {
    url: String,
    document: Value,
}

impl IdentityConfiguration {
    pub fn new(url: impl Into<String>, document: Value) -> Self {
        Self {
            url: url.into(),
            document,
        }
    }

    /// A named endpoint (`authorization_endpoint`, `token_endpoint`, ...).
    ///
    /// Missing or empty is a hard failure.
    pub fn endpoint(&self, name: &str) -> BrokerResult<String> {
        match get_string(&self.document, name, true) {
            Ok(Some(endpoint)) => Ok(endpoint.to_string()),
            Ok(None) => Err(self.invalid(format!("{} not found in JSON payload", name))),
            Err(e) => Err(self.invalid(e.description)),
        }
    }

    fn invalid(&self, reason: String) -> BrokerError {
        BrokerError::UpstreamResponse {
            url: self.url.clone(),
            reason,
        }
    }
}

/// Discovery client
pub struct IdentityDiscovery {
    client: UpstreamClient,
    url: String,
}

impl IdentityDiscovery {
    pub fn new(client: UpstreamClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Fetch the configuration document
    pub async fn fetch(&self) -> BrokerResult<IdentityConfiguration> {
        debug!(url = %self.url, "[IAM] Fetching identity configuration");

        let document = self
            .client
            .send(&self.url, self.client.get(&self.url))
            .await?
            .ok_or_else(|| BrokerError::UpstreamResponse {
                url: self.url.clone(),
                reason: format!("Unable to retrieve from {}", self.url),
            })?;

        info!(url = %self.url, "[IAM] Identity configuration retrieved");
        Ok(IdentityConfiguration::new(&self.url, document))
    }

    /// Fetch the configuration and return one endpoint from it
    pub async fn endpoint(&self, name: &str) -> BrokerResult<String> {
        self.fetch().await?.endpoint(name)
    }
}
