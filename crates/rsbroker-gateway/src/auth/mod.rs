//! Platform authentication
//!
//! The broker API is protected by HTTP Basic credentials shared with the
//! platform. Browser routes are not.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsbroker_core::BrokerConfig;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::server::AppState;

/// Credentials presented in an `Authorization: Basic` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub user: String,
    pub password: String,
}

impl BasicCredentials {
    /// Decode an `Authorization` header value
    pub fn from_header(value: &str) -> Option<Self> {
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;

        Some(Self {
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    /// Whether these match the configured broker credentials
    pub fn matches(&self, config: &BrokerConfig) -> bool {
        // Evaluate both so timing does not reveal which one failed
        let user_ok = constant_time_eq(self.user.as_bytes(), config.broker_user.as_bytes());
        let password_ok =
            constant_time_eq(self.password.as_bytes(), config.broker_password.as_bytes());
        user_ok & password_ok
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"Resource Service Broker\"")],
        Json(json!({ "description": "Unauthorized" })),
    )
        .into_response()
}

/// Reject requests without the broker's Basic credentials
pub async fn basic_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(BasicCredentials::from_header);

    match credentials {
        Some(credentials) if credentials.matches(&state.config) => {
            debug!(user = %credentials.user, "[Auth] Platform authenticated");
            next.run(request).await
        }
        Some(credentials) => {
            warn!(user = %credentials.user, "[Auth] Invalid broker credentials");
            unauthorized_response()
        }
        None => {
            warn!(path = %request.uri().path(), "[Auth] Missing broker credentials");
            unauthorized_response()
        }
    }
}
