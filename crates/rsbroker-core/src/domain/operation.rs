//! Asynchronous operation records
//!
//! Each provision/update/deprovision accepted in async mode gets an
//! operation with an opaque token the platform polls with.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Provision,
    Update,
    Deprovision,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Update => "update",
            Self::Deprovision => "deprovision",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State as reported by `last_operation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncOperation {
    /// Opaque to the platform: `<kind>-<uuid>`
    pub token: String,
    pub instance_id: String,
    pub kind: OperationKind,
    pub state: OperationState,
    pub description: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl AsyncOperation {
    pub fn begin(
        instance_id: impl Into<String>,
        kind: OperationKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            token: format!("{}-{}", kind, Uuid::new_v4()),
            instance_id: instance_id.into(),
            kind,
            state: OperationState::InProgress,
            description: description.into(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Record the terminal state; a finished operation is never reopened
    pub fn finish(&mut self, success: bool, description: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = if success {
            OperationState::Succeeded
        } else {
            OperationState::Failed
        };
        self.description = description.into();
        self.completed_at = Some(Utc::now());
    }

    pub fn status(&self) -> OperationStatus {
        OperationStatus {
            state: self.state,
            description: self.description.clone(),
        }
    }
}

/// Body of a `last_operation` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub state: OperationState,
    pub description: String,
}
