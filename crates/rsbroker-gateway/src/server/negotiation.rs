//! Content negotiation for the broker API
//!
//! Bodies must be JSON (415 otherwise) and the caller must accept a JSON
//! response (406 otherwise). A missing `Accept` header accepts anything.

use axum::{
    extract::Request,
    http::{header, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

const UNSUPPORTED_CONTENT_TYPE: &str = "Content-Type must be application/json";
const NOT_ACCEPTABLE: &str = "Accept type must be application/json";

/// `application/json`, with or without parameters, or a `+json` type
pub fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    let media_type = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type == "application/json"
        || (media_type.starts_with("application/") && media_type.ends_with("+json"))
}

/// Whether the `Accept` header admits `application/json`
pub fn accepts_json(headers: &HeaderMap) -> bool {
    let values: Vec<&str> = headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if values.is_empty() {
        return true;
    }

    values
        .iter()
        .flat_map(|v| v.split(','))
        .any(|range| {
            let mut parts = range.split(';');
            let media_range = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
            let refused = parts.any(|p| {
                let p = p.trim();
                p.strip_prefix("q=")
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .is_some_and(|q| q <= 0.0)
            });
            !refused && matches!(media_range.as_str(), "application/json" | "application/*" | "*/*")
        })
}

fn has_body(method: &Method) -> bool {
    method == Method::PUT || method == Method::PATCH
}

/// Enablement updates answer 204 and never negotiate a response type
fn skips_accept(method: &Method, path: &str) -> bool {
    method == Method::PUT && path.starts_with("/bluemix_v1/")
}

fn reject(status: StatusCode, description: &str) -> Response {
    (status, Json(json!({ "description": description }))).into_response()
}

pub async fn json_negotiation_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let headers = request.headers();

    if has_body(&method) && !is_json_content_type(headers) {
        debug!(path = %path, "[Broker] Rejecting non-JSON body");
        return reject(StatusCode::UNSUPPORTED_MEDIA_TYPE, UNSUPPORTED_CONTENT_TYPE);
    }

    if !skips_accept(&method, &path) && !accepts_json(headers) {
        debug!(path = %path, "[Broker] Caller does not accept JSON");
        return reject(StatusCode::NOT_ACCEPTABLE, NOT_ACCEPTABLE);
    }

    next.run(request).await
}
