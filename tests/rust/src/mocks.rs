use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rsbroker_core::{Credentials, DefaultBackend, ServiceBackend, ServiceBinding, ServiceInstance};
use tokio::sync::Semaphore;

/// Backend whose every call fails
#[derive(Debug, Default)]
pub struct FailingBackend;

#[async_trait]
impl ServiceBackend for FailingBackend {
    async fn provision(&self, _instance: &ServiceInstance) -> anyhow::Result<()> {
        anyhow::bail!("backing service unavailable")
    }

    async fn update(&self, _instance: &ServiceInstance, _previous: &str) -> anyhow::Result<()> {
        anyhow::bail!("backing service unavailable")
    }

    async fn deprovision(&self, _instance: &ServiceInstance) -> anyhow::Result<()> {
        anyhow::bail!("backing service unavailable")
    }

    async fn bind(
        &self,
        _instance: &ServiceInstance,
        _binding_id: &str,
        _app_guid: Option<&str>,
    ) -> anyhow::Result<Credentials> {
        anyhow::bail!("backing service unavailable")
    }

    async fn unbind(&self, _binding: &ServiceBinding) -> anyhow::Result<()> {
        anyhow::bail!("backing service unavailable")
    }
}

/// Backend whose provision/update/deprovision wait for a permit.
///
/// Lets a test observe an operation while it is still in progress.
#[derive(Debug, Clone)]
pub struct GatedBackend {
    gate: Arc<Semaphore>,
    calls: Arc<AtomicUsize>,
}

impl Default for GatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GatedBackend {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Let one pending operation finish
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Number of lifecycle calls that reached the backend
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await?.forget();
        Ok(())
    }
}

#[async_trait]
impl ServiceBackend for GatedBackend {
    async fn provision(&self, _instance: &ServiceInstance) -> anyhow::Result<()> {
        self.wait().await
    }

    async fn update(&self, _instance: &ServiceInstance, _previous: &str) -> anyhow::Result<()> {
        self.wait().await
    }

    async fn deprovision(&self, _instance: &ServiceInstance) -> anyhow::Result<()> {
        self.wait().await
    }

    async fn bind(
        &self,
        instance: &ServiceInstance,
        binding_id: &str,
        app_guid: Option<&str>,
    ) -> anyhow::Result<Credentials> {
        let backend = DefaultBackend;
        backend.bind(instance, binding_id, app_guid).await
    }

    async fn unbind(&self, binding: &ServiceBinding) -> anyhow::Result<()> {
        let backend = DefaultBackend;
        backend.unbind(binding).await
    }
}
