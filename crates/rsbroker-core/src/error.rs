//! Broker error taxonomy
//!
//! Every failure a protocol call can produce, with its HTTP status and the
//! optional machine-readable `error` code of the broker API.

use crate::validation::ValidationError;

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Malformed or missing request field
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Request is well-formed but refers to something unusable
    #[error("{0}")]
    BadRequest(String),

    /// Bad credentials or denied policy decision
    #[error("{0}")]
    Unauthorized(String),

    /// Duplicate provision/bind with different parameters
    #[error("{0}")]
    Conflict(String),

    #[error("This service plan requires client support for asynchronous service operations.")]
    AsyncRequired,

    #[error("This service supports generation of credentials through binding an application only.")]
    RequiresApp,

    /// Another operation is still running for the instance
    #[error("Another operation for service instance {instance_id} is in progress")]
    OperationInProgress { instance_id: String },

    #[error("The service does not support changing plan from {from} to {to}")]
    PlanChangeNotSupported { from: String, to: String },

    /// No operation was ever recorded for the instance
    #[error("No operation recorded for service instance {0}")]
    NoOperation(String),

    /// Operation token does not match the instance's last operation
    #[error("Operation {operation} is not known for service instance {instance_id}")]
    UnknownOperation {
        instance_id: String,
        operation: String,
    },

    /// Deleted or never-existing resource on a delete-class call
    #[error("Gone")]
    Gone,

    /// Upstream endpoint answered with an unexpected status
    #[error("Unexpected return code from url {url} is {status}")]
    Upstream { url: String, status: u16 },

    /// Upstream endpoint answered 200 with an unusable body
    #[error("Invalid response from url {url}: {reason}")]
    UpstreamResponse { url: String, reason: String },

    /// Upstream endpoint unreachable
    #[error("Unable to reach {url}: {reason}")]
    UpstreamUnavailable { url: String, reason: String },

    #[error("Timed out waiting for {url}")]
    UpstreamTimeout { url: String },

    /// Token payload could not be decoded
    #[error("Malformed access token: {0}")]
    MalformedToken(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BrokerError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_)
            | Self::BadRequest(_)
            | Self::NoOperation(_)
            | Self::UnknownOperation { .. } => 400,
            Self::Unauthorized(_) => 401,
            Self::Conflict(_) => 409,
            Self::Gone => 410,
            Self::AsyncRequired
            | Self::RequiresApp
            | Self::OperationInProgress { .. }
            | Self::PlanChangeNotSupported { .. } => 422,
            Self::Upstream { status, .. } => *status,
            Self::UpstreamUnavailable { .. } => 502,
            Self::UpstreamTimeout { .. } => 504,
            Self::UpstreamResponse { .. } | Self::MalformedToken(_) | Self::Internal(_) => 500,
        }
    }

    /// Broker API error code, for errors that define one
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::AsyncRequired => Some("AsyncRequired"),
            Self::RequiresApp => Some("RequiresApp"),
            Self::OperationInProgress { .. } => Some("ConcurrencyError"),
            Self::PlanChangeNotSupported { .. } => Some("PlanChangeNotSupported"),
            _ => None,
        }
    }

    /// Description safe to return to the caller.
    ///
    /// Internal errors never leak their cause.
    pub fn description(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}
