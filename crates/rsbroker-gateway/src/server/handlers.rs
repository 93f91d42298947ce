//! Broker API handlers
//!
//! Each handler parses the request, hands it to the lifecycle engine and
//! renders the outcome. Status codes and bodies follow the broker API.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use rsbroker_core::{
    BindOutcome, BindRequest, BrokerError, DeprovisionOutcome, EnableRequest,
    InstanceEnablement, OperationStatus, OriginatingIdentity, ProvisionOutcome, ProvisionRequest,
    UpdateOutcome, UpdateRequest, ORIGINATING_IDENTITY_HEADER,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::AppState;

/// A broker error rendered as an API response
#[derive(Debug)]
pub struct ApiError(pub BrokerError);

impl From<BrokerError> for ApiError {
    fn from(error: BrokerError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status == StatusCode::GONE {
            return (status, Json(json!({}))).into_response();
        }

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %error, "[Broker] Request failed");
        } else {
            debug!(status = status.as_u16(), error = %error, "[Broker] Request rejected");
        }

        let mut body = json!({ "description": error.description() });
        if let Some(code) = error.error_code() {
            body["error"] = json!(code);
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Query parameters of the broker API
#[derive(Debug, Default, Deserialize)]
pub struct BrokerQuery {
    pub accepts_incomplete: Option<String>,
    pub plan_id: Option<String>,
    pub service_id: Option<String>,
    pub operation: Option<String>,
}

impl BrokerQuery {
    pub fn accepts_incomplete(&self) -> bool {
        self.accepts_incomplete
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

fn parse_body(body: &Bytes) -> Result<Value, BrokerError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "[Broker] Body is not valid JSON");
        BrokerError::BadRequest("Malformed JSON payload".to_string())
    })
}

/// Decode and log the originating identity; a malformed header is a 400
fn log_identity(headers: &HeaderMap, call: &str) -> Result<(), BrokerError> {
    let header = headers
        .get(ORIGINATING_IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok());

    match OriginatingIdentity::from_header(header)? {
        Some(identity) => info!(
            call,
            platform = %identity.platform,
            identity = %identity.value,
            "[Broker] Originating identity"
        ),
        None => debug!(call, "[Broker] No originating identity"),
    }
    Ok(())
}

/// Liveness check, not part of the broker API
pub async fn root() -> &'static str {
    "This is a test"
}

pub async fn catalog(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    log_identity(&headers, "catalog")?;
    Ok(Json(state.catalog.document().clone()))
}

pub async fn provision(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Query(query): Query<BrokerQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    log_identity(&headers, "provision")?;
    let request = ProvisionRequest::from_payload(&parse_body(&body)?).map_err(BrokerError::from)?;

    let outcome = state
        .engine
        .provision(&instance_id, request, query.accepts_incomplete())
        .await?;

    let response = match outcome {
        ProvisionOutcome::Created { dashboard_url } => (
            StatusCode::CREATED,
            Json(json!({ "dashboard_url": dashboard_url })),
        ),
        ProvisionOutcome::Existing { dashboard_url } => (
            StatusCode::OK,
            Json(json!({ "dashboard_url": dashboard_url })),
        ),
        ProvisionOutcome::Accepted {
            dashboard_url,
            operation,
        } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "dashboard_url": dashboard_url,
                "description": operation.description,
                "operation": operation.token,
            })),
        ),
    };
    Ok(response.into_response())
}

pub async fn update(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Query(query): Query<BrokerQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    log_identity(&headers, "update")?;
    let request = UpdateRequest::from_payload(&parse_body(&body)?).map_err(BrokerError::from)?;

    let outcome = state
        .engine
        .update(&instance_id, request, query.accepts_incomplete())
        .await?;

    let response = match outcome {
        UpdateOutcome::Updated => (StatusCode::OK, Json(json!({}))),
        UpdateOutcome::Accepted(operation) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "description": operation.description,
                "operation": operation.token,
            })),
        ),
    };
    Ok(response.into_response())
}

pub async fn deprovision(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Query(query): Query<BrokerQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    log_identity(&headers, "deprovision")?;
    debug!(
        instance_id = %instance_id,
        plan_id = ?query.plan_id,
        service_id = ?query.service_id,
        "[Broker] Deprovision requested"
    );

    let outcome = state
        .engine
        .deprovision(&instance_id, query.accepts_incomplete())
        .await?;

    let response = match outcome {
        DeprovisionOutcome::Deleted => (StatusCode::OK, Json(json!({}))),
        DeprovisionOutcome::Accepted(operation) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "description": operation.description,
                "operation": operation.token,
            })),
        ),
    };
    Ok(response.into_response())
}

pub async fn bind(
    State(state): State<AppState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    log_identity(&headers, "bind")?;
    let request = BindRequest::from_payload(&parse_body(&body)?).map_err(BrokerError::from)?;

    let outcome = state.engine.bind(&instance_id, &binding_id, request).await?;
    let status = match outcome {
        BindOutcome::Created(_) => StatusCode::CREATED,
        BindOutcome::Existing(_) => StatusCode::OK,
    };

    Ok((
        status,
        Json(json!({ "credentials": outcome.binding().credentials })),
    )
        .into_response())
}

pub async fn unbind(
    State(state): State<AppState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
    Query(query): Query<BrokerQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    log_identity(&headers, "unbind")?;
    debug!(
        instance_id = %instance_id,
        binding_id = %binding_id,
        plan_id = ?query.plan_id,
        service_id = ?query.service_id,
        "[Broker] Unbind requested"
    );

    state.engine.unbind(&instance_id, &binding_id).await?;
    Ok(Json(json!({})))
}

pub async fn last_operation(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Query(query): Query<BrokerQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<OperationStatus>> {
    log_identity(&headers, "last_operation")?;

    let status = state
        .engine
        .last_operation(&instance_id, query.operation.as_deref())?;
    Ok(Json(status))
}

/// Enable or disable an instance (IBM Cloud extension)
pub async fn set_enablement(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    log_identity(&headers, "set_enablement")?;
    let request = EnableRequest::from_payload(&parse_body(&body)?).map_err(BrokerError::from)?;

    state.engine.set_enablement(&instance_id, request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Enablement state of an instance (IBM Cloud extension)
pub async fn enablement(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<InstanceEnablement>> {
    log_identity(&headers, "enablement")?;

    match state.engine.enablement(&instance_id).await {
        Ok(enablement) => Ok(Json(enablement)),
        Err(e) => {
            warn!(instance_id = %instance_id, error = %e, "[Broker] Enablement lookup failed");
            Err(e.into())
        }
    }
}
