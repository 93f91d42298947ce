//! Service binding entity
//!
//! A binding hands an application (or a service key, when no application is
//! named) the credentials for one instance. A binding never outlives its
//! instance.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credentials handed out by a bind call
pub type Credentials = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBinding {
    pub instance_id: String,
    pub binding_id: String,
    pub service_id: String,
    pub plan_id: String,

    /// Application the credentials are for; absent for service keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_guid: Option<String>,

    pub credentials: Credentials,
    pub created_at: DateTime<Utc>,
}

impl ServiceBinding {
    pub fn new(
        instance_id: impl Into<String>,
        binding_id: impl Into<String>,
        service_id: impl Into<String>,
        plan_id: impl Into<String>,
        app_guid: Option<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            binding_id: binding_id.into(),
            service_id: service_id.into(),
            plan_id: plan_id.into(),
            app_guid,
            credentials,
            created_at: Utc::now(),
        }
    }

    /// A repeated bind with these parameters is idempotent
    pub fn matches(&self, service_id: &str, plan_id: &str, app_guid: Option<&str>) -> bool {
        self.service_id == service_id
            && self.plan_id == plan_id
            && self.app_guid.as_deref() == app_guid
    }

    /// Bound to a service key rather than an application
    pub fn is_service_key(&self) -> bool {
        self.app_guid.is_none()
    }
}
