//! Repository traits for broker state
//!
//! The broker keeps only what the protocol needs: instances and their
//! bindings. Storage is behind a trait so a durable store can replace the
//! in-memory one.

use async_trait::async_trait;

use crate::domain::{ServiceBinding, ServiceInstance};

mod memory;

pub use memory::InMemoryInstanceRepository;

/// Result type for repository operations
pub type RepoResult<T> = anyhow::Result<T>;

/// Instance and binding storage
#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Get an instance by ID, in any status
    async fn get(&self, instance_id: &str) -> RepoResult<Option<ServiceInstance>>;

    /// Insert or replace an instance
    async fn save(&self, instance: &ServiceInstance) -> RepoResult<()>;

    /// Get a binding of an instance
    async fn get_binding(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> RepoResult<Option<ServiceBinding>>;

    /// Insert or replace a binding
    async fn save_binding(&self, binding: &ServiceBinding) -> RepoResult<()>;

    /// Delete a binding, returning whether it existed
    async fn delete_binding(&self, instance_id: &str, binding_id: &str) -> RepoResult<bool>;

    /// Delete every binding of an instance, returning how many were removed
    async fn delete_bindings_for_instance(&self, instance_id: &str) -> RepoResult<usize>;
}
