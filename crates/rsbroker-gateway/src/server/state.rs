//! Shared handler state

use std::sync::Arc;

use rsbroker_core::{BrokerConfig, LifecycleEngine, ServiceCatalog};

use crate::sso::DashboardSso;

/// State handed to every handler; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BrokerConfig>,
    pub catalog: Arc<ServiceCatalog>,
    pub engine: LifecycleEngine,
    pub sso: Arc<DashboardSso>,
}
