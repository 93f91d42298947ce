//! Service instance entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::validation::{get_object, get_string, require_string, ValidationResult};

/// Platform name that unlocks the IBM Cloud context fields
pub const IBMCLOUD_PLATFORM: &str = "ibmcloud";

/// Lifecycle status of an instance. Absent instances have no record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Provisioning,
    Active,
    Updating,
    Deprovisioning,
    Deleted,
    Failed,
}

impl InstanceStatus {
    /// An operation is running against the instance
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            Self::Provisioning | Self::Updating | Self::Deprovisioning
        )
    }

    /// The instance id may be provisioned (again)
    pub fn is_reusable(self) -> bool {
        matches!(self, Self::Deleted | Self::Failed)
    }
}

/// IBM Cloud specific context fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbmCloudContext {
    pub account_id: String,
    pub crn: String,
    pub resource_group_crn: String,
    pub target_crn: String,
}

/// Platform metadata sent with provision/update/bind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformContext {
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ibmcloud: Option<IbmCloudContext>,
}

impl PlatformContext {
    /// Parse a context object. `platform` is required, and the four IBM
    /// Cloud fields are required when the platform is `ibmcloud`.
    pub fn from_value(context: &Value) -> ValidationResult<Self> {
        let platform = require_string(context, "platform")?;

        let ibmcloud = if platform == IBMCLOUD_PLATFORM {
            Some(IbmCloudContext {
                account_id: require_string(context, "account_id")?,
                crn: require_string(context, "crn")?,
                resource_group_crn: require_string(context, "resource_group_crn")?,
                target_crn: require_string(context, "target_crn")?,
            })
        } else {
            None
        };

        Ok(Self { platform, ibmcloud })
    }

    /// Parse the `context` field of a payload
    pub fn from_payload(json: &Value, required: bool) -> ValidationResult<Option<Self>> {
        if get_object(json, "context", required)?.is_none() {
            return Ok(None);
        }
        Self::from_value(&json["context"]).map(Some)
    }

    /// Platform name only, for calls where the IBM fields are not needed
    pub fn platform_only(json: &Value) -> ValidationResult<Option<Self>> {
        if get_object(json, "context", false)?.is_none() {
            return Ok(None);
        }
        let platform = require_string(&json["context"], "platform")?;
        Ok(Some(Self {
            platform,
            ibmcloud: None,
        }))
    }
}

/// A provisioned unit of the backing service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub context: PlatformContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
    pub dashboard_url: String,
    pub status: InstanceStatus,
    /// Enablement extension flag; instances start enabled
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceInstance {
    pub fn new(
        instance_id: impl Into<String>,
        service_id: impl Into<String>,
        plan_id: impl Into<String>,
        context: PlatformContext,
        dashboard_url: impl Into<String>,
        status: InstanceStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            instance_id: instance_id.into(),
            service_id: service_id.into(),
            plan_id: plan_id.into(),
            context,
            parameters: None,
            dashboard_url: dashboard_url.into(),
            status,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new status, stamping the update time
    pub fn transition(&mut self, status: InstanceStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Record an enablement change, stamping the update time
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.updated_at = Utc::now();
    }

    /// Same provisioning parameters as a repeated request
    pub fn matches(
        &self,
        service_id: &str,
        plan_id: &str,
        parameters: Option<&Map<String, Value>>,
    ) -> bool {
        self.service_id == service_id
            && self.plan_id == plan_id
            && self.parameters.as_ref() == parameters
    }

    /// Instance exists from the platform's point of view
    pub fn is_live(&self) -> bool {
        !self.status.is_reusable()
    }
}

/// Enablement extension state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceEnablement {
    pub enabled: bool,
    /// Only meaningful when enabled
    pub active: bool,
    /// Milliseconds since the epoch of the last state change
    pub last_active: i64,
}

impl From<&ServiceInstance> for InstanceEnablement {
    fn from(instance: &ServiceInstance) -> Self {
        Self {
            enabled: instance.enabled,
            active: instance.enabled
                && matches!(
                    instance.status,
                    InstanceStatus::Active | InstanceStatus::Updating
                ),
            last_active: instance.updated_at.timestamp_millis(),
        }
    }
}

/// Optional `parameters` object of a payload, cloned
pub fn parameters_from_payload(json: &Value) -> ValidationResult<Option<Map<String, Value>>> {
    Ok(get_object(json, "parameters", false)?.cloned())
}

/// Optional string, cloned
pub fn optional_string(json: &Value, name: &str) -> ValidationResult<Option<String>> {
    Ok(get_string(json, name, false)?.map(str::to_string))
}
