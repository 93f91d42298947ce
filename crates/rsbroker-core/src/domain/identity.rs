//! Originating identity of a platform request
//!
//! The `X-Broker-Api-Originating-Identity` header carries the platform name
//! and a base64-encoded JSON object identifying the end user. It is decoded
//! for logging only and never drives authorization.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use crate::error::BrokerError;

/// Header name, lower case as axum exposes it
pub const ORIGINATING_IDENTITY_HEADER: &str = "x-broker-api-originating-identity";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginatingIdentity {
    pub platform: String,
    pub value: Value,
}

impl OriginatingIdentity {
    /// Parse `<platform> <base64(json)>`
    pub fn parse(header: &str) -> Result<Self, BrokerError> {
        let malformed =
            || BrokerError::BadRequest(format!("{} header is malformed", ORIGINATING_IDENTITY_HEADER));

        let mut parts = header.split_whitespace();
        let (Some(platform), Some(encoded), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let bytes = STANDARD
            .decode(encoded)
            .or_else(|_| STANDARD_NO_PAD.decode(encoded))
            .map_err(|_| malformed())?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|_| malformed())?;
        if !value.is_object() {
            return Err(malformed());
        }

        Ok(Self {
            platform: platform.to_string(),
            value,
        })
    }

    /// Parse an optional header value
    pub fn from_header(header: Option<&str>) -> Result<Option<Self>, BrokerError> {
        header.map(Self::parse).transpose()
    }
}
