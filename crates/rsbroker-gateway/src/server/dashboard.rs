//! Browser-facing dashboard routes

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::AppState;
use crate::sso::SsoOutcome;

const AUTHORIZED: &str = "You can manage this service instance";
const NOT_AUTHORIZED: &str = "You are not authorized to manage this service instance";
const SIGN_ON_FAILED: &str = "Unable to complete sign-on";

#[derive(Debug, Deserialize)]
pub struct SsoCallback {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Start sign-on: redirect to the identity provider
pub async fn dashboard(State(state): State<AppState>, Path(instance_id): Path<String>) -> Response {
    match state.sso.authorize_redirect(&instance_id).await {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(e) => {
            warn!(instance_id = %instance_id, error = %e, "[SSO] Unable to start sign-on");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "description": "Unable to start sign-on" })),
            )
                .into_response()
        }
    }
}

/// Finish sign-on: render the gated page or a refusal
pub async fn sso_dashboard(
    State(state): State<AppState>,
    Query(callback): Query<SsoCallback>,
) -> Response {
    let outcome = state
        .sso
        .complete(callback.code.as_deref(), callback.state.as_deref())
        .await;

    match outcome {
        SsoOutcome::Authorized => (StatusCode::OK, Html(AUTHORIZED)).into_response(),
        SsoOutcome::Denied => (StatusCode::UNAUTHORIZED, Html(NOT_AUTHORIZED)).into_response(),
        SsoOutcome::Malformed => {
            (StatusCode::INTERNAL_SERVER_ERROR, Html(SIGN_ON_FAILED)).into_response()
        }
    }
}
