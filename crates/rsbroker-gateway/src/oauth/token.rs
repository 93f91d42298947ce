//! Token exchanges against the identity provider
//!
//! Two grants are used by the dashboard flow: the authorization code the
//! browser brings back, and the broker's own API key. Both return `None`
//! when the provider answers 400-404.

use std::sync::Arc;

use rsbroker_core::config::APIKEY_GRANT_TYPE;
use rsbroker_core::validation::get_string;
use rsbroker_core::{BrokerConfig, BrokerError, BrokerResult};
use serde_json::Value;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::transport::UpstreamClient;

/// Form `response_type` asking for an IAM token
const CLOUD_IAM_RESPONSE_TYPE: &str = "cloud_iam";

pub struct TokenExchangeClient {
    client: UpstreamClient,
    config: Arc<BrokerConfig>,
}

impl TokenExchangeClient {
    pub fn new(client: UpstreamClient, config: Arc<BrokerConfig>) -> Self {
        Self { client, config }
    }

    /// Exchange an authorization code for the user's access token
    pub async fn exchange_code(
        &self,
        token_endpoint: &str,
        code: &str,
    ) -> BrokerResult<Option<Zeroizing<String>>> {
        let redirect_uri = self.config.sso_redirect_uri();
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", CLOUD_IAM_RESPONSE_TYPE),
        ];

        let request = self
            .client
            .post(token_endpoint)
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.as_str()),
            )
            .form(&form);

        debug!(token_endpoint, "[IAM] Exchanging authorization code");
        let token = self.read_token(token_endpoint, request).await?;
        if token.is_some() {
            info!("[IAM] Authorization code exchanged");
        }
        Ok(token)
    }

    /// Exchange the broker's API key for an access token
    pub async fn exchange_api_key(&self) -> BrokerResult<Option<Zeroizing<String>>> {
        let url = self.config.api_key_token_url();
        let form = [
            ("apikey", self.config.api_key.as_str()),
            ("grant_type", APIKEY_GRANT_TYPE),
            ("response_type", CLOUD_IAM_RESPONSE_TYPE),
        ];

        debug!(url = %url, "[IAM] Exchanging API key");
        let token = self
            .read_token(&url, self.client.post(&url).form(&form))
            .await?;
        if token.is_some() {
            info!("[IAM] API key exchanged");
        }
        Ok(token)
    }

    async fn read_token(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> BrokerResult<Option<Zeroizing<String>>> {
        let Some(json) = self.client.send(url, request).await? else {
            return Ok(None);
        };
        access_token(url, &json).map(Some)
    }
}

/// `access_token` of a token response; a 200 without one is an upstream error
fn access_token(url: &str, json: &Value) -> BrokerResult<Zeroizing<String>> {
    let invalid = |reason: String| BrokerError::UpstreamResponse {
        url: url.to_string(),
        reason,
    };

    match get_string(json, "access_token", true) {
        Ok(Some(token)) => Ok(Zeroizing::new(token.to_string())),
        Ok(None) => Err(invalid("access_token not found in JSON payload".to_string())),
        Err(e) => Err(invalid(e.description)),
    }
}
