//! Backing service contract
//!
//! The lifecycle engine decides *when* work happens; a `ServiceBackend`
//! does it. Errors are plumbing failures (anyhow) and mark the operation
//! failed.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Credentials, ServiceBinding, ServiceInstance};

#[async_trait]
pub trait ServiceBackend: Send + Sync {
    /// Create the resources behind a new instance
    async fn provision(&self, instance: &ServiceInstance) -> anyhow::Result<()>;

    /// Apply a plan/parameter change; `instance` already carries the new values
    async fn update(&self, instance: &ServiceInstance, previous_plan_id: &str)
        -> anyhow::Result<()>;

    /// Release the resources of an instance
    async fn deprovision(&self, instance: &ServiceInstance) -> anyhow::Result<()>;

    /// Generate credentials for a binding
    async fn bind(
        &self,
        instance: &ServiceInstance,
        binding_id: &str,
        app_guid: Option<&str>,
    ) -> anyhow::Result<Credentials>;

    /// Revoke the credentials of a binding
    async fn unbind(&self, binding: &ServiceBinding) -> anyhow::Result<()>;
}

/// Backend that does no external work and issues random credentials
#[derive(Debug, Default, Clone)]
pub struct DefaultBackend;

#[async_trait]
impl ServiceBackend for DefaultBackend {
    async fn provision(&self, instance: &ServiceInstance) -> anyhow::Result<()> {
        debug!(instance_id = %instance.instance_id, "[Backend] provision");
        Ok(())
    }

    async fn update(
        &self,
        instance: &ServiceInstance,
        previous_plan_id: &str,
    ) -> anyhow::Result<()> {
        debug!(
            instance_id = %instance.instance_id,
            from = %previous_plan_id,
            to = %instance.plan_id,
            "[Backend] update"
        );
        Ok(())
    }

    async fn deprovision(&self, instance: &ServiceInstance) -> anyhow::Result<()> {
        debug!(instance_id = %instance.instance_id, "[Backend] deprovision");
        Ok(())
    }

    async fn bind(
        &self,
        instance: &ServiceInstance,
        binding_id: &str,
        _app_guid: Option<&str>,
    ) -> anyhow::Result<Credentials> {
        debug!(instance_id = %instance.instance_id, binding_id, "[Backend] bind");

        let mut credentials = Credentials::new();
        credentials.insert("userid".to_string(), Uuid::new_v4().to_string());
        credentials.insert("password".to_string(), Uuid::new_v4().to_string());
        Ok(credentials)
    }

    async fn unbind(&self, binding: &ServiceBinding) -> anyhow::Result<()> {
        debug!(
            instance_id = %binding.instance_id,
            binding_id = %binding.binding_id,
            "[Backend] unbind"
        );
        Ok(())
    }
}
