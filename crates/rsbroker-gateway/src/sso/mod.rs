//! Dashboard single sign-on
//!
//! The browser is sent to the identity provider with the instance id as
//! `state`; on return the authorization code and the broker's API key are
//! both exchanged for tokens, and the policy endpoint decides whether the
//! user may view that instance. Each step waits for the previous one.

use std::sync::Arc;

use rsbroker_core::{BrokerConfig, BrokerError, BrokerResult};
use tracing::{debug, info, warn};
use url::Url;

use crate::authz::AuthorizationDecisionClient;
use crate::oauth::{AccessTokenClaims, IdentityDiscovery, TokenExchangeClient, UpstreamClient};

/// Result of a completed sign-on, as rendered to the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsoOutcome {
    Authorized,
    /// Any failure along the way, including upstream errors
    Denied,
    /// The identity token could not be decoded
    Malformed,
}

pub struct DashboardSso {
    config: Arc<BrokerConfig>,
    discovery: IdentityDiscovery,
    tokens: TokenExchangeClient,
    authz: AuthorizationDecisionClient,
}

impl DashboardSso {
    /// Build the clients, sharing one HTTP connection pool
    pub fn new(config: Arc<BrokerConfig>) -> anyhow::Result<Self> {
        let client = UpstreamClient::new(config.upstream_timeout)?;
        Ok(Self {
            discovery: IdentityDiscovery::new(client.clone(), config.identity_configuration_url()),
            tokens: TokenExchangeClient::new(client.clone(), config.clone()),
            authz: AuthorizationDecisionClient::new(client, config.clone()),
            config,
        })
    }

    /// Where to send the browser to start signing on to `instance_id`
    pub async fn authorize_redirect(&self, instance_id: &str) -> BrokerResult<String> {
        let endpoint = self.discovery.endpoint("authorization_endpoint").await?;

        let mut url = Url::parse(&endpoint).map_err(|e| BrokerError::UpstreamResponse {
            url: self.config.identity_configuration_url(),
            reason: format!("authorization_endpoint is not a URL: {}", e),
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.sso_redirect_uri())
            .append_pair("response_type", "code")
            .append_pair("state", instance_id);

        info!(instance_id, "[SSO] Redirecting to identity provider");
        Ok(url.into())
    }

    /// Finish sign-on for the callback's `code` and `state`
    pub async fn complete(&self, code: Option<&str>, state: Option<&str>) -> SsoOutcome {
        let (Some(code), Some(instance_id)) = (non_empty(code), non_empty(state)) else {
            warn!("[SSO] Callback without code or state");
            return SsoOutcome::Denied;
        };

        match self.authorize(code, instance_id).await {
            Ok(true) => {
                info!(instance_id, "[SSO] Dashboard access granted");
                SsoOutcome::Authorized
            }
            Ok(false) => {
                info!(instance_id, "[SSO] Dashboard access denied");
                SsoOutcome::Denied
            }
            Err(BrokerError::MalformedToken(reason)) => {
                warn!(instance_id, reason = %reason, "[SSO] Identity token could not be decoded");
                SsoOutcome::Malformed
            }
            Err(e) => {
                warn!(instance_id, error = %e, "[SSO] Sign-on failed");
                SsoOutcome::Denied
            }
        }
    }

    async fn authorize(&self, code: &str, instance_id: &str) -> BrokerResult<bool> {
        let token_endpoint = self.discovery.endpoint("token_endpoint").await?;

        let Some(user_token) = self.tokens.exchange_code(&token_endpoint, code).await? else {
            debug!(instance_id, "[SSO] Authorization code rejected");
            return Ok(false);
        };
        let Some(api_token) = self.tokens.exchange_api_key().await? else {
            warn!("[SSO] API key rejected by identity provider");
            return Ok(false);
        };

        let claims = AccessTokenClaims::decode(&user_token)?;
        self.authz
            .is_permitted(&claims, &api_token, instance_id)
            .await
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
