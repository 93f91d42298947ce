//! HTTP request/response logging middleware
//!
//! One entry and one exit line per request, bodies at DEBUG.

use axum::{body::Body, extract::Request, http::StatusCode, middleware::Next, response::Response};
use http_body_util::BodyExt;
use rsbroker_core::ORIGINATING_IDENTITY_HEADER;
use tracing::{debug, warn, Instrument};

use crate::logging::{RequestSpan, TraceContext};

/// Maximum body size to log (1MB)
const MAX_BODY_LOG_SIZE: usize = 1024 * 1024;

/// Paths whose bodies carry credentials
const SENSITIVE_PATHS: &[&str] = &["/service_bindings/"];

/// Browser pages; the HTML is not worth logging
const SKIP_BODY_PATHS: &[&str] = &["/dashboard/", "/sso_dashboard"];

const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

pub fn is_sensitive_path(path: &str) -> bool {
    SENSITIVE_PATHS.iter().any(|p| path.contains(p))
}

fn should_skip_body(path: &str) -> bool {
    SKIP_BODY_PATHS.iter().any(|p| path.contains(p))
}

fn redact_headers_compact(headers: &axum::http::HeaderMap) -> String {
    headers
        .iter()
        .filter(|(name, _)| {
            matches!(
                name.as_str(),
                "content-type" | "accept" | "user-agent" | "authorization" | "x-broker-api-version"
            )
        })
        .map(|(name, value)| {
            if SENSITIVE_HEADERS.contains(&name.as_str()) {
                format!("{}=[REDACTED]", name)
            } else {
                format!("{}={:?}", name, value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compact rendering of a body for the log
pub fn format_body(bytes: &[u8], redact: bool) -> String {
    if redact {
        return "[REDACTED]".to_string();
    }

    if bytes.is_empty() {
        return "[empty]".to_string();
    }

    if bytes.len() > MAX_BODY_LOG_SIZE {
        return format!("[{} bytes]", bytes.len());
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
                return serde_json::to_string(&json).unwrap_or_else(|_| text.to_string());
            }
            if text.len() > 200 {
                let cut = (0..=200).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
                format!("{}...", &text[..cut])
            } else {
                text.to_string()
            }
        }
        Err(_) => format!("[binary: {} bytes]", bytes.len()),
    }
}

/// Platform named by the originating identity header, without decoding it
fn identity_platform(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(ORIGINATING_IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_whitespace().next())
        .map(String::from)
}

/// Logging middleware for requests and responses
pub async fn http_logging_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let headers = request.headers().clone();
    let is_sensitive = is_sensitive_path(&path);
    let skip_body = should_skip_body(&path);

    let ctx = TraceContext::new(&method, &path).with_platform(identity_platform(&headers));
    let span = RequestSpan::enter(&ctx);

    async move {
        RequestSpan::log_entry(&ctx);
        debug!(
            trace_id = %ctx.trace_id,
            headers = %redact_headers_compact(&headers),
            "Request headers"
        );

        let (parts, body) = request.into_parts();
        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read request body: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        if !skip_body && !body_bytes.is_empty() {
            debug!(
                trace_id = %ctx.trace_id,
                body = %format_body(&body_bytes, false),
                "Request body"
            );
        }

        let request = Request::from_parts(parts, Body::from(body_bytes));

        let response = next.run(request).await;

        let (parts, body) = response.into_parts();
        let status = parts.status;

        let body_bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read response body: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        if !skip_body && !body_bytes.is_empty() && body_bytes.len() < 1000 {
            debug!(
                trace_id = %ctx.trace_id,
                body = %format_body(&body_bytes, is_sensitive),
                "Response body"
            );
        }

        RequestSpan::log_exit(&ctx, status.as_u16());

        Ok(Response::from_parts(parts, Body::from(body_bytes)))
    }
    .instrument(span)
    .await
}
