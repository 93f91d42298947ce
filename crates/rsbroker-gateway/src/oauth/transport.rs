//! Shared transport for identity and policy calls
//!
//! Every outbound call goes through [`UpstreamClient::send`], which maps
//! responses onto one contract:
//!
//! - 200: the parsed JSON body
//! - 400, 401, 403, 404: no result (`None`), logged
//! - any other status: [`BrokerError::Upstream`] carrying that status
//! - unreachable: [`BrokerError::UpstreamUnavailable`] (502)
//! - timeout: [`BrokerError::UpstreamTimeout`] (504)

use std::time::Duration;

use anyhow::Context;
use reqwest::{header, RequestBuilder, StatusCode};
use rsbroker_core::{BrokerError, BrokerResult};
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
}

impl UpstreamClient {
    /// Client whose every request is bounded by `timeout`
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.http.post(url)
    }

    /// Send a request and apply the response contract
    pub async fn send(&self, url: &str, request: RequestBuilder) -> BrokerResult<Option<Value>> {
        debug!(url, "[IAM] Calling upstream");

        let response = request
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let json = response
                    .json::<Value>()
                    .await
                    .map_err(|e| transport_error(url, e))?;
                Ok(Some(json))
            }
            StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND => {
                info!(url, status = status.as_u16(), "[IAM] Upstream returned no result");
                Ok(None)
            }
            other => {
                warn!(url, status = other.as_u16(), "[IAM] Unexpected upstream status");
                Err(BrokerError::Upstream {
                    url: url.to_string(),
                    status: other.as_u16(),
                })
            }
        }
    }
}

fn transport_error(url: &str, error: reqwest::Error) -> BrokerError {
    if error.is_timeout() {
        warn!(url, "[IAM] Upstream timed out");
        return BrokerError::UpstreamTimeout {
            url: url.to_string(),
        };
    }
    if error.is_decode() {
        return BrokerError::UpstreamResponse {
            url: url.to_string(),
            reason: error.to_string(),
        };
    }
    warn!(url, error = %error, "[IAM] Upstream unreachable");
    BrokerError::UpstreamUnavailable {
        url: url.to_string(),
        reason: error.to_string(),
    }
}
