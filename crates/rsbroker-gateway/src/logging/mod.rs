//! Request logging
//!
//! Short trace ids correlate the entry and exit lines of a request with
//! everything logged while handling it.

mod trace_context;

pub use trace_context::{generate_trace_id, RequestSpan, TraceContext};
