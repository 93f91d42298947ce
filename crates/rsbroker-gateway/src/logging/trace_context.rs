//! Per-request trace context

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use tracing::{info, info_span, Span};

static NEXT_TRACE: AtomicU32 = AtomicU32::new(1);

/// Six hex characters, unique per process until the counter wraps
pub fn generate_trace_id() -> String {
    let seq = NEXT_TRACE.fetch_add(1, Ordering::Relaxed);
    // Spread consecutive ids so neighbouring requests are easy to tell apart
    format!("{:06x}", seq.wrapping_mul(0x9E3779B1) >> 8)
}

/// Instance id named by a `/v2/service_instances/{id}/...` or
/// `/bluemix_v1/service_instances/{id}` path, or by `/dashboard/{id}`
pub fn instance_from_path(path: &str) -> Option<&str> {
    let rest = path
        .strip_prefix("/v2/service_instances/")
        .or_else(|| path.strip_prefix("/bluemix_v1/service_instances/"))
        .or_else(|| path.strip_prefix("/dashboard/"))?;
    rest.split('/').next().filter(|id| !id.is_empty())
}

#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub method: String,
    pub path: String,
    pub instance_id: Option<String>,
    /// Platform named by the originating identity header
    pub platform: Option<String>,
    pub started_at: Instant,
}

impl TraceContext {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            trace_id: generate_trace_id(),
            method: method.to_string(),
            path: path.to_string(),
            instance_id: instance_from_path(path).map(String::from),
            platform: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_platform(mut self, platform: Option<String>) -> Self {
        self.platform = platform;
        self
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

pub struct RequestSpan;

impl RequestSpan {
    pub fn enter(ctx: &TraceContext) -> Span {
        info_span!(
            "broker_request",
            trace_id = %ctx.trace_id,
            instance_id = ctx.instance_id.as_deref().unwrap_or("-"),
        )
    }

    pub fn log_entry(ctx: &TraceContext) {
        info!(
            trace_id = %ctx.trace_id,
            platform = ctx.platform.as_deref().unwrap_or("-"),
            "→ {} {}",
            ctx.method,
            ctx.path
        );
    }

    pub fn log_exit(ctx: &TraceContext, status: u16) {
        info!(
            trace_id = %ctx.trace_id,
            status,
            elapsed_ms = ctx.elapsed_ms() as u64,
            "← {} {}",
            ctx.method,
            ctx.path
        );
    }
}
