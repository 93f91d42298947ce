//! In-memory instance store

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{InstanceRepository, RepoResult};
use crate::domain::{ServiceBinding, ServiceInstance};

/// Process-local store; state is lost on restart
#[derive(Default)]
pub struct InMemoryInstanceRepository {
    instances: RwLock<HashMap<String, ServiceInstance>>,
    /// Keyed by (instance_id, binding_id)
    bindings: RwLock<HashMap<(String, String), ServiceBinding>>,
}

impl InMemoryInstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceRepository for InMemoryInstanceRepository {
    async fn get(&self, instance_id: &str) -> RepoResult<Option<ServiceInstance>> {
        Ok(self.instances.read().await.get(instance_id).cloned())
    }

    async fn save(&self, instance: &ServiceInstance) -> RepoResult<()> {
        self.instances
            .write()
            .await
            .insert(instance.instance_id.clone(), instance.clone());
        Ok(())
    }

    async fn get_binding(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> RepoResult<Option<ServiceBinding>> {
        let key = (instance_id.to_string(), binding_id.to_string());
        Ok(self.bindings.read().await.get(&key).cloned())
    }

    async fn save_binding(&self, binding: &ServiceBinding) -> RepoResult<()> {
        let key = (binding.instance_id.clone(), binding.binding_id.clone());
        self.bindings.write().await.insert(key, binding.clone());
        Ok(())
    }

    async fn delete_binding(&self, instance_id: &str, binding_id: &str) -> RepoResult<bool> {
        let key = (instance_id.to_string(), binding_id.to_string());
        Ok(self.bindings.write().await.remove(&key).is_some())
    }

    async fn delete_bindings_for_instance(&self, instance_id: &str) -> RepoResult<usize> {
        let mut bindings = self.bindings.write().await;
        let before = bindings.len();
        bindings.retain(|(owner, _), _| owner != instance_id);
        Ok(before - bindings.len())
    }
}
