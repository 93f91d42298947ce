//! Identity token claims
//!
//! The payload segment of the user's access token is decoded to learn who
//! is asking. The signature is NOT verified here; the token was just
//! received from the identity provider over TLS, and the policy endpoint
//! makes the actual decision.
// TODO: verify the signature against the provider's jwks_uri keys.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use rsbroker_core::validation::require_string;
use rsbroker_core::{BrokerError, BrokerResult};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenClaims {
    pub iam_id: String,
    pub scope: String,
}

impl AccessTokenClaims {
    /// Decode `iam_id` and `scope` from a JWT payload
    pub fn decode(token: &str) -> BrokerResult<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| BrokerError::MalformedToken("token has no payload segment".into()))?;

        let bytes = decode_segment(payload)
            .ok_or_else(|| BrokerError::MalformedToken("payload is not base64".into()))?;
        let json: Value = serde_json::from_slice(&bytes)
            .map_err(|e| BrokerError::MalformedToken(format!("payload is not JSON: {}", e)))?;

        let claim = |name: &str| {
            require_string(&json, name).map_err(|e| BrokerError::MalformedToken(e.description))
        };

        Ok(Self {
            iam_id: claim("iam_id")?,
            scope: claim("scope")?,
        })
    }
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    [&URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD_NO_PAD, &STANDARD]
        .iter()
        .find_map(|engine| engine.decode(segment).ok())
}
