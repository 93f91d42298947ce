//! Typed protocol requests built from validated JSON payloads
//!
//! Fields are extracted in a fixed order so the first problem reported for a
//! payload is deterministic.

use serde_json::{Map, Value};

use crate::validation::{get_bool, get_object, require_string, ValidationError, ValidationResult};

use super::instance::{optional_string, parameters_from_payload, PlatformContext};

/// Provision body: `{context, parameters?, plan_id, service_id}`
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionRequest {
    pub service_id: String,
    pub plan_id: String,
    pub context: PlatformContext,
    pub parameters: Option<Map<String, Value>>,
}

impl ProvisionRequest {
    pub fn from_payload(json: &Value) -> ValidationResult<Self> {
        get_object(json, "context", true)?;
        let parameters = parameters_from_payload(json)?;
        let plan_id = require_string(json, "plan_id")?;
        let service_id = require_string(json, "service_id")?;
        let context = PlatformContext::from_value(&json["context"])?;

        Ok(Self {
            service_id,
            plan_id,
            context,
            parameters,
        })
    }
}

/// Update body: `{context, parameters?, plan_id, previous_values: {plan_id}, service_id}`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub service_id: String,
    pub plan_id: String,
    pub previous_plan_id: String,
    pub context: PlatformContext,
    pub parameters: Option<Map<String, Value>>,
}

impl UpdateRequest {
    pub fn from_payload(json: &Value) -> ValidationResult<Self> {
        get_object(json, "context", true)?;
        let parameters = parameters_from_payload(json)?;
        let plan_id = require_string(json, "plan_id")?;
        get_object(json, "previous_values", true)?;
        let previous_plan_id = require_string(&json["previous_values"], "plan_id")?;
        let service_id = require_string(json, "service_id")?;
        let context = PlatformContext::from_value(&json["context"])?;

        Ok(Self {
            service_id,
            plan_id,
            previous_plan_id,
            context,
            parameters,
        })
    }
}

/// Bind body: `{bind_resource?: {app_guid?}, context?, parameters?, plan_id, service_id}`
#[derive(Debug, Clone, PartialEq)]
pub struct BindRequest {
    pub service_id: String,
    pub plan_id: String,
    pub app_guid: Option<String>,
    pub context: Option<PlatformContext>,
    pub parameters: Option<Map<String, Value>>,
}

impl BindRequest {
    pub fn from_payload(json: &Value) -> ValidationResult<Self> {
        let has_bind_resource = get_object(json, "bind_resource", false)?.is_some();
        get_object(json, "context", false)?;
        let parameters = parameters_from_payload(json)?;
        let plan_id = require_string(json, "plan_id")?;
        let service_id = require_string(json, "service_id")?;

        let app_guid = if has_bind_resource {
            optional_string(&json["bind_resource"], "app_guid")?
        } else {
            None
        };
        let context = PlatformContext::platform_only(json)?;

        Ok(Self {
            service_id,
            plan_id,
            app_guid,
            context,
            parameters,
        })
    }
}

/// Enablement extension body: `{enabled, initiator_id, reason_code}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableRequest {
    pub enabled: bool,
    pub initiator_id: String,
    pub reason_code: String,
}

impl EnableRequest {
    pub fn from_payload(json: &Value) -> ValidationResult<Self> {
        let enabled = get_bool(json, "enabled", true)?
            .ok_or_else(|| ValidationError::new("enabled not found in JSON payload"))?;
        let initiator_id = require_string(json, "initiator_id")?;
        let reason_code = require_string(json, "reason_code")?;

        Ok(Self {
            enabled,
            initiator_id,
            reason_code,
        })
    }
}
