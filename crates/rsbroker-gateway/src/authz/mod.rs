//! Authorization decision client
//!
//! Asks the policy endpoint whether a user may view an instance's dashboard.

use std::sync::Arc;

use rsbroker_core::validation::{get_array_entry, get_bool, get_object, get_string};
use rsbroker_core::{BrokerConfig, BrokerError, BrokerResult};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::oauth::{AccessTokenClaims, UpstreamClient};

/// Status the policy endpoint reports for an evaluated request
const EVALUATED_STATUS: &str = "200";

pub struct AuthorizationDecisionClient {
    client: UpstreamClient,
    config: Arc<BrokerConfig>,
}

impl AuthorizationDecisionClient {
    pub fn new(client: UpstreamClient, config: Arc<BrokerConfig>) -> Self {
        Self { client, config }
    }

    /// Whether `claims` may perform the dashboard action on `instance_id`.
    ///
    /// `api_token` authenticates the broker itself. A 400-404 from the
    /// policy endpoint is a denial.
    pub async fn is_permitted(
        &self,
        claims: &AccessTokenClaims,
        api_token: &str,
        instance_id: &str,
    ) -> BrokerResult<bool> {
        let url = self.config.authz_url();
        let body = decision_request(claims, instance_id, &self.config.dashboard_action());

        debug!(url = %url, iam_id = %claims.iam_id, instance_id, "[Authz] Requesting decision");

        let request = self.client.post(&url).bearer_auth(api_token).json(&body);
        let Some(json) = self.client.send(&url, request).await? else {
            info!(instance_id, "[Authz] No decision returned, treating as denied");
            return Ok(false);
        };

        let permitted = read_decision(&url, &json)?;
        info!(
            iam_id = %claims.iam_id,
            instance_id,
            permitted,
            "[Authz] Decision received"
        );
        Ok(permitted)
    }
}

fn decision_request(claims: &AccessTokenClaims, instance_id: &str, action: &str) -> Value {
    json!([{
        "subject": {
            "attributes": {
                "id": claims.iam_id,
                "scope": claims.scope,
            }
        },
        "resource": {
            "crn": instance_id,
        },
        "action": action,
    }])
}

/// `responses[0].authorizationDecision.permitted`, once the entry reports it
/// was evaluated
fn read_decision(url: &str, json: &Value) -> BrokerResult<bool> {
    let invalid = |reason: String| BrokerError::UpstreamResponse {
        url: url.to_string(),
        reason,
    };

    let entry = get_array_entry(json, "responses", 0, true)
        .map_err(|e| invalid(e.description))?
        .map(|entry| Value::Object(entry.clone()))
        .ok_or_else(|| invalid("responses not found in JSON payload".to_string()))?;

    let status = get_string(&entry, "status", true)
        .map_err(|e| invalid(e.description))?
        .unwrap_or_default();
    if status != EVALUATED_STATUS {
        return Err(invalid(format!("Error: {}", status)));
    }

    let decision = get_object(&entry, "authorizationDecision", true)
        .map_err(|e| invalid(e.description))?
        .map(|decision| Value::Object(decision.clone()))
        .ok_or_else(|| invalid("authorizationDecision not found in JSON payload".to_string()))?;

    get_bool(&decision, "permitted", true)
        .map_err(|e| invalid(e.description))?
        .ok_or_else(|| invalid("permitted not found in JSON payload".to_string()))
}
