//! Instance and binding lifecycle engine
//!
//! Decides, for every protocol call, which state transition happens and
//! what the platform is told. All transitions of one instance are
//! serialized through a per-instance lock; different instances proceed in
//! parallel. Async work runs in a spawned task that re-acquires the lock
//! before recording its outcome.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use super::backend::ServiceBackend;
use super::operation_tracker::OperationTracker;
use crate::config::BrokerConfig;
use crate::domain::{
    AsyncOperation, BindRequest, EnableRequest, InstanceEnablement, InstanceStatus, OperationKind,
    OperationStatus, ProvisionRequest, ServiceBinding, ServiceCatalog, ServiceInstance,
    UpdateRequest,
};
use crate::error::{BrokerError, BrokerResult};
use crate::repository::InstanceRepository;

const PROVISION_ACCEPTED: &str = "This service instance is being created asynchronously for you.";
const UPDATE_ACCEPTED: &str = "This service instance is being updated asynchronously for you.";
const DEPROVISION_ACCEPTED: &str = "This service instance is being deleted asynchronously for you.";
const OPERATION_COMPLETE: &str = "This asynchronous operation is complete";

#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionOutcome {
    /// Provisioned synchronously (201)
    Created { dashboard_url: String },
    /// Provisioning runs in the background (202)
    Accepted {
        dashboard_url: String,
        operation: AsyncOperation,
    },
    /// Identical repeat of a finished provision (200)
    Existing { dashboard_url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated,
    Accepted(AsyncOperation),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeprovisionOutcome {
    Deleted,
    Accepted(AsyncOperation),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindOutcome {
    /// New binding (201)
    Created(ServiceBinding),
    /// Identical repeat, same credentials (200)
    Existing(ServiceBinding),
}

impl BindOutcome {
    pub fn binding(&self) -> &ServiceBinding {
        match self {
            Self::Created(binding) | Self::Existing(binding) => binding,
        }
    }
}

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Holds an instance's lock. On release the map entry is dropped unless
/// another caller is holding or waiting for it.
struct InstanceGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
    instance_id: String,
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.instance_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Protocol state machine for instances and bindings
#[derive(Clone)]
pub struct LifecycleEngine {
    config: Arc<BrokerConfig>,
    catalog: Arc<ServiceCatalog>,
    repository: Arc<dyn InstanceRepository>,
    backend: Arc<dyn ServiceBackend>,
    tracker: Arc<OperationTracker>,
    locks: Arc<LockMap>,
}

impl LifecycleEngine {
    pub fn new(
        config: Arc<BrokerConfig>,
        catalog: Arc<ServiceCatalog>,
        repository: Arc<dyn InstanceRepository>,
        backend: Arc<dyn ServiceBackend>,
    ) -> Self {
        Self {
            config,
            catalog,
            repository,
            backend,
            tracker: Arc::new(OperationTracker::new()),
            locks: Arc::new(DashMap::new()),
        }
    }

    async fn lock_instance(&self, instance_id: &str) -> InstanceGuard {
        let lock = self
            .locks
            .entry(instance_id.to_string())
            .or_default()
            .value()
            .clone();
        InstanceGuard {
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
            instance_id: instance_id.to_string(),
        }
    }

    /// Record an operation's instance, failing the operation if the
    /// record cannot be written
    async fn save_for_operation(
        &self,
        instance: &ServiceInstance,
        operation: &AsyncOperation,
    ) -> BrokerResult<()> {
        if let Err(e) = self.repository.save(instance).await {
            error!(
                instance_id = %instance.instance_id,
                operation = %operation.token,
                error = %e,
                "[Lifecycle] Failed to record instance"
            );
            let err = BrokerError::from(e);
            self.tracker
                .complete(&operation.token, false, &err.description());
            return Err(err);
        }
        Ok(())
    }

    /// Fails before any state is read when the service is async-only and
    /// the caller does not accept incomplete responses
    fn check_async(&self, accepts_incomplete: bool) -> BrokerResult<()> {
        if self.config.requires_async() && !accepts_incomplete {
            return Err(BrokerError::AsyncRequired);
        }
        Ok(())
    }

    fn use_async(&self, accepts_incomplete: bool) -> bool {
        self.config.async_supported && accepts_incomplete
    }

    /// Instance that exists from the platform's point of view
    async fn live_instance(&self, instance_id: &str) -> BrokerResult<Option<ServiceInstance>> {
        Ok(self
            .repository
            .get(instance_id)
            .await?
            .filter(ServiceInstance::is_live))
    }

    async fn require_instance(&self, instance_id: &str) -> BrokerResult<ServiceInstance> {
        self.live_instance(instance_id).await?.ok_or_else(|| {
            BrokerError::BadRequest(format!("Service instance {} does not exist", instance_id))
        })
    }

    // ========================================================================
    // Provision
    // ========================================================================

    pub async fn provision(
        &self,
        instance_id: &str,
        request: ProvisionRequest,
        accepts_incomplete: bool,
    ) -> BrokerResult<ProvisionOutcome> {
        self.check_async(accepts_incomplete)?;

        let _guard = self.lock_instance(instance_id).await;

        if let Some(existing) = self.live_instance(instance_id).await? {
            return self.repeat_provision(existing, &request);
        }
        // Operations of an earlier incarnation are not this instance's
        self.tracker.forget(instance_id);

        let dashboard_url = self.config.dashboard_url(instance_id);
        let mut instance = ServiceInstance::new(
            instance_id,
            &request.service_id,
            &request.plan_id,
            request.context,
            &dashboard_url,
            InstanceStatus::Provisioning,
        );
        instance.parameters = request.parameters;

        if self.use_async(accepts_incomplete) {
            let operation =
                self.tracker
                    .begin(instance_id, OperationKind::Provision, PROVISION_ACCEPTED)?;
            self.save_for_operation(&instance, &operation).await?;

            info!(
                instance_id,
                operation = %operation.token,
                "[Lifecycle] Provision accepted"
            );
            self.spawn_provision(instance, operation.token.clone());

            return Ok(ProvisionOutcome::Accepted {
                dashboard_url,
                operation,
            });
        }

        if let Err(e) = self.backend.provision(&instance).await {
            instance.transition(InstanceStatus::Failed);
            self.repository.save(&instance).await?;
            error!(instance_id, error = %e, "[Lifecycle] Provision failed");
            return Err(e.into());
        }

        instance.transition(InstanceStatus::Active);
        self.repository.save(&instance).await?;
        info!(instance_id, plan_id = %instance.plan_id, "[Lifecycle] Provisioned");

        Ok(ProvisionOutcome::Created { dashboard_url })
    }

    fn repeat_provision(
        &self,
        existing: ServiceInstance,
        request: &ProvisionRequest,
    ) -> BrokerResult<ProvisionOutcome> {
        if !existing.matches(
            &request.service_id,
            &request.plan_id,
            request.parameters.as_ref(),
        ) {
            warn!(
                instance_id = %existing.instance_id,
                "[Lifecycle] Provision conflicts with existing instance"
            );
            return Err(BrokerError::Conflict(format!(
                "Service instance {} already exists with different attributes",
                existing.instance_id
            )));
        }

        match existing.status {
            InstanceStatus::Provisioning => match self.tracker.in_progress(&existing.instance_id) {
                Some(operation) => Ok(ProvisionOutcome::Accepted {
                    dashboard_url: existing.dashboard_url,
                    operation,
                }),
                None => Err(BrokerError::OperationInProgress {
                    instance_id: existing.instance_id,
                }),
            },
            InstanceStatus::Deprovisioning => Err(BrokerError::OperationInProgress {
                instance_id: existing.instance_id,
            }),
            _ => Ok(ProvisionOutcome::Existing {
                dashboard_url: existing.dashboard_url,
            }),
        }
    }

    fn spawn_provision(&self, instance: ServiceInstance, token: String) {
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.backend.provision(&instance).await;
            let instance_id = instance.instance_id.clone();

            let _guard = engine.lock_instance(&instance_id).await;

            let (status, description) = match &result {
                Ok(()) => (InstanceStatus::Active, OPERATION_COMPLETE.to_string()),
                Err(e) => (InstanceStatus::Failed, format!("Provision failed: {}", e)),
            };
            engine
                .finish_operation(&instance_id, &token, status, result.is_ok(), &description)
                .await;
        });
    }

    // ========================================================================
    // Update
    // ========================================================================

    pub async fn update(
        &self,
        instance_id: &str,
        request: UpdateRequest,
        accepts_incomplete: bool,
    ) -> BrokerResult<UpdateOutcome> {
        self.check_async(accepts_incomplete)?;

        let _guard = self.lock_instance(instance_id).await;

        let mut instance = self.require_instance(instance_id).await?;
        if instance.status.is_transitional() || self.tracker.in_progress(instance_id).is_some() {
            return Err(BrokerError::OperationInProgress {
                instance_id: instance_id.to_string(),
            });
        }

        if request.plan_id != instance.plan_id {
            let updateable = self
                .catalog
                .service(&instance.service_id)
                .map_or(true, |service| service.plan_updateable);
            if !updateable {
                return Err(BrokerError::PlanChangeNotSupported {
                    from: instance.plan_id,
                    to: request.plan_id,
                });
            }
        }

        let previous = instance.clone();
        instance.plan_id = request.plan_id;
        instance.context = request.context;
        if request.parameters.is_some() {
            instance.parameters = request.parameters;
        }

        if self.use_async(accepts_incomplete) {
            let operation = self
                .tracker
                .begin(instance_id, OperationKind::Update, UPDATE_ACCEPTED)?;
            instance.transition(InstanceStatus::Updating);
            self.save_for_operation(&instance, &operation).await?;

            info!(
                instance_id,
                operation = %operation.token,
                "[Lifecycle] Update accepted"
            );
            self.spawn_update(instance, previous, operation.token.clone());
            return Ok(UpdateOutcome::Accepted(operation));
        }

        self.backend
            .update(&instance, &previous.plan_id)
            .await
            .map_err(|e| {
                error!(instance_id, error = %e, "[Lifecycle] Update failed");
                BrokerError::from(e)
            })?;

        instance.transition(InstanceStatus::Active);
        self.repository.save(&instance).await?;
        info!(
            instance_id,
            from = %previous.plan_id,
            to = %instance.plan_id,
            "[Lifecycle] Updated"
        );

        Ok(UpdateOutcome::Updated)
    }

    fn spawn_update(&self, instance: ServiceInstance, previous: ServiceInstance, token: String) {
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.backend.update(&instance, &previous.plan_id).await;
            let instance_id = instance.instance_id.clone();

            let _guard = engine.lock_instance(&instance_id).await;

            let description = match &result {
                Ok(()) => OPERATION_COMPLETE.to_string(),
                Err(e) => {
                    // Failed updates leave the instance on its previous values
                    if let Err(restore_err) = engine.restore(&previous).await {
                        error!(
                            instance_id = %instance_id,
                            error = %restore_err,
                            "[Lifecycle] Failed to restore instance"
                        );
                    }
                    format!("Update failed: {}", e)
                }
            };
            engine
                .finish_operation(
                    &instance_id,
                    &token,
                    InstanceStatus::Active,
                    result.is_ok(),
                    &description,
                )
                .await;
        });
    }

    /// Put back the values an instance had before a failed update,
    /// keeping any enablement change made in the meantime
    async fn restore(&self, previous: &ServiceInstance) -> BrokerResult<()> {
        let mut restored = previous.clone();
        if let Some(current) = self.repository.get(&previous.instance_id).await? {
            restored.enabled = current.enabled;
        }
        self.repository.save(&restored).await?;
        Ok(())
    }

    // ========================================================================
    // Deprovision
    // ========================================================================

    pub async fn deprovision(
        &self,
        instance_id: &str,
        accepts_incomplete: bool,
    ) -> BrokerResult<DeprovisionOutcome> {
        self.check_async(accepts_incomplete)?;

        let _guard = self.lock_instance(instance_id).await;

        let Some(mut instance) = self.repository.get(instance_id).await? else {
            return Err(BrokerError::Gone);
        };
        if instance.status == InstanceStatus::Deleted {
            return Err(BrokerError::Gone);
        }
        if instance.status.is_transitional() || self.tracker.in_progress(instance_id).is_some() {
            return Err(BrokerError::OperationInProgress {
                instance_id: instance_id.to_string(),
            });
        }

        if self.use_async(accepts_incomplete) {
            let operation = self.tracker.begin(
                instance_id,
                OperationKind::Deprovision,
                DEPROVISION_ACCEPTED,
            )?;
            let previous_status = instance.status;
            instance.transition(InstanceStatus::Deprovisioning);
            self.save_for_operation(&instance, &operation).await?;

            info!(
                instance_id,
                operation = %operation.token,
                "[Lifecycle] Deprovision accepted"
            );
            self.spawn_deprovision(instance, previous_status, operation.token.clone());
            return Ok(DeprovisionOutcome::Accepted(operation));
        }

        self.backend.deprovision(&instance).await.map_err(|e| {
            error!(instance_id, error = %e, "[Lifecycle] Deprovision failed");
            BrokerError::from(e)
        })?;

        self.mark_deleted(&mut instance).await?;
        self.tracker.forget(instance_id);
        info!(instance_id, "[Lifecycle] Deprovisioned");

        Ok(DeprovisionOutcome::Deleted)
    }

    fn spawn_deprovision(
        &self,
        instance: ServiceInstance,
        previous_status: InstanceStatus,
        token: String,
    ) {
        let engine = self.clone();
        tokio::spawn(async move {
            let result = engine.backend.deprovision(&instance).await;
            let instance_id = instance.instance_id.clone();

            let _guard = engine.lock_instance(&instance_id).await;

            let (status, description) = match &result {
                Ok(()) => (InstanceStatus::Deleted, OPERATION_COMPLETE.to_string()),
                Err(e) => (previous_status, format!("Deprovision failed: {}", e)),
            };
            engine
                .finish_operation(&instance_id, &token, status, result.is_ok(), &description)
                .await;
        });
    }

    async fn mark_deleted(&self, instance: &mut ServiceInstance) -> BrokerResult<()> {
        instance.transition(InstanceStatus::Deleted);
        self.repository.save(instance).await?;
        let removed = self
            .repository
            .delete_bindings_for_instance(&instance.instance_id)
            .await?;
        if removed > 0 {
            info!(
                instance_id = %instance.instance_id,
                removed,
                "[Lifecycle] Removed bindings of deleted instance"
            );
        }
        Ok(())
    }

    /// Record the outcome of background work. Caller holds the instance lock.
    async fn finish_operation(
        &self,
        instance_id: &str,
        token: &str,
        status: InstanceStatus,
        success: bool,
        description: &str,
    ) {
        // The operation reports failure if its outcome could not be stored
        let (success, description) = match self.store_outcome(instance_id, status).await {
            Ok(()) => (success, description.to_string()),
            Err(e) => {
                error!(instance_id, error = %e, "[Lifecycle] Failed to record operation outcome");
                (false, e.description())
            }
        };

        self.tracker.complete(token, success, &description);
        if success {
            info!(instance_id, operation = token, "[Lifecycle] Operation succeeded");
        } else {
            warn!(instance_id, operation = token, %description, "[Lifecycle] Operation failed");
        }
    }

    async fn store_outcome(&self, instance_id: &str, status: InstanceStatus) -> BrokerResult<()> {
        let Some(mut instance) = self.repository.get(instance_id).await? else {
            return Ok(());
        };
        if status == InstanceStatus::Deleted {
            return self.mark_deleted(&mut instance).await;
        }
        instance.transition(status);
        self.repository.save(&instance).await?;
        Ok(())
    }

    // ========================================================================
    // Bind / unbind
    // ========================================================================

    pub async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        request: BindRequest,
    ) -> BrokerResult<BindOutcome> {
        if request.app_guid.is_none() && !self.config.service_keys_supported {
            return Err(BrokerError::RequiresApp);
        }

        let _guard = self.lock_instance(instance_id).await;

        let instance = self.require_instance(instance_id).await?;
        if !matches!(
            instance.status,
            InstanceStatus::Active | InstanceStatus::Updating
        ) {
            return Err(BrokerError::BadRequest(format!(
                "Service instance {} is not active",
                instance_id
            )));
        }

        if let Some(existing) = self.repository.get_binding(instance_id, binding_id).await? {
            if existing.matches(
                &request.service_id,
                &request.plan_id,
                request.app_guid.as_deref(),
            ) {
                return Ok(BindOutcome::Existing(existing));
            }
            warn!(instance_id, binding_id, "[Lifecycle] Bind conflicts with existing binding");
            return Err(BrokerError::Conflict(format!(
                "Service binding {} already exists with different attributes",
                binding_id
            )));
        }

        let credentials = self
            .backend
            .bind(&instance, binding_id, request.app_guid.as_deref())
            .await?;
        let binding = ServiceBinding::new(
            instance_id,
            binding_id,
            request.service_id,
            request.plan_id,
            request.app_guid,
            credentials,
        );
        self.repository.save_binding(&binding).await?;

        info!(
            instance_id,
            binding_id,
            service_key = binding.is_service_key(),
            "[Lifecycle] Bound"
        );
        Ok(BindOutcome::Created(binding))
    }

    /// Remove a binding; `Gone` when there is nothing to remove
    pub async fn unbind(&self, instance_id: &str, binding_id: &str) -> BrokerResult<()> {
        let _guard = self.lock_instance(instance_id).await;

        let Some(binding) = self.repository.get_binding(instance_id, binding_id).await? else {
            return Err(BrokerError::Gone);
        };

        self.backend.unbind(&binding).await?;
        self.repository.delete_binding(instance_id, binding_id).await?;

        info!(instance_id, binding_id, "[Lifecycle] Unbound");
        Ok(())
    }

    // ========================================================================
    // Last operation / enablement
    // ========================================================================

    pub fn last_operation(
        &self,
        instance_id: &str,
        operation: Option<&str>,
    ) -> BrokerResult<OperationStatus> {
        self.tracker.poll(instance_id, operation)
    }

    pub async fn set_enablement(
        &self,
        instance_id: &str,
        request: EnableRequest,
    ) -> BrokerResult<()> {
        let _guard = self.lock_instance(instance_id).await;

        let mut instance = self.require_instance(instance_id).await?;
        instance.set_enabled(request.enabled);
        self.repository.save(&instance).await?;

        info!(
            instance_id,
            enabled = request.enabled,
            initiator_id = %request.initiator_id,
            reason_code = %request.reason_code,
            "[Lifecycle] Enablement changed"
        );
        Ok(())
    }

    pub async fn enablement(&self, instance_id: &str) -> BrokerResult<InstanceEnablement> {
        let instance = self.require_instance(instance_id).await?;
        Ok(InstanceEnablement::from(&instance))
    }
}
