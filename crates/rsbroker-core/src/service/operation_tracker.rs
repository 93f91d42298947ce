//! Async operation tracker
//!
//! Remembers the last operation per instance so `last_operation` can be
//! answered. At most one operation per instance is in progress at a time.
//! Entries of deleted instances go away once the platform has seen the
//! final state, so the maps only hold instances that still exist.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::domain::{AsyncOperation, OperationKind, OperationState, OperationStatus};
use crate::error::{BrokerError, BrokerResult};

#[derive(Default)]
pub struct OperationTracker {
    /// Last operation per instance
    operations: DashMap<String, AsyncOperation>,
    /// Token -> instance index
    tokens: DashMap<String, String>,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new operation, replacing the instance's finished one
    pub fn begin(
        &self,
        instance_id: &str,
        kind: OperationKind,
        description: &str,
    ) -> BrokerResult<AsyncOperation> {
        let operation = AsyncOperation::begin(instance_id, kind, description);

        match self.operations.entry(instance_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().state.is_terminal() {
                    return Err(BrokerError::OperationInProgress {
                        instance_id: instance_id.to_string(),
                    });
                }
                self.tokens.remove(&entry.get().token);
                entry.insert(operation.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(operation.clone());
            }
        }
        self.tokens
            .insert(operation.token.clone(), instance_id.to_string());

        debug!(
            instance_id,
            operation = %operation.token,
            "[Tracker] Operation started"
        );
        Ok(operation)
    }

    /// Record the outcome of an operation. Returns false for unknown tokens.
    pub fn complete(&self, token: &str, success: bool, description: &str) -> bool {
        let Some(instance_id) = self.tokens.get(token).map(|id| id.value().clone()) else {
            warn!(operation = token, "[Tracker] Completion for unknown operation");
            return false;
        };

        let Some(mut operation) = self.operations.get_mut(&instance_id) else {
            return false;
        };
        if operation.token != token {
            return false;
        }
        operation.finish(success, description);

        debug!(
            instance_id = %instance_id,
            operation = token,
            state = ?operation.state,
            "[Tracker] Operation finished"
        );
        true
    }

    /// State of the instance's last operation.
    ///
    /// When a token is given it must match that operation. A succeeded
    /// deprovision is reported once and then forgotten.
    pub fn poll(&self, instance_id: &str, token: Option<&str>) -> BrokerResult<OperationStatus> {
        let (status, finished_deprovision) = {
            let operation = self
                .operations
                .get(instance_id)
                .ok_or_else(|| BrokerError::NoOperation(instance_id.to_string()))?;

            if let Some(token) = token {
                if operation.token != token {
                    return Err(BrokerError::UnknownOperation {
                        instance_id: instance_id.to_string(),
                        operation: token.to_string(),
                    });
                }
            }

            let finished_deprovision = (operation.kind == OperationKind::Deprovision
                && operation.state == OperationState::Succeeded)
                .then(|| operation.token.clone());
            (operation.status(), finished_deprovision)
        };

        if let Some(token) = finished_deprovision {
            self.remove_where(instance_id, |op| op.token == token);
        }
        Ok(status)
    }

    /// Drop the instance's finished operation. A running one is kept.
    pub fn forget(&self, instance_id: &str) {
        self.remove_where(instance_id, |op| op.state.is_terminal());
    }

    fn remove_where(&self, instance_id: &str, predicate: impl Fn(&AsyncOperation) -> bool) {
        let Some((_, operation)) = self
            .operations
            .remove_if(instance_id, |_, op| predicate(op))
        else {
            return;
        };
        self.tokens.remove(&operation.token);
        debug!(
            instance_id,
            operation = %operation.token,
            "[Tracker] Operation forgotten"
        );
    }

    /// The instance's operation, if one is running
    pub fn in_progress(&self, instance_id: &str) -> Option<AsyncOperation> {
        self.operations
            .get(instance_id)
            .filter(|op| !op.state.is_terminal())
            .map(|op| op.value().clone())
    }
}
