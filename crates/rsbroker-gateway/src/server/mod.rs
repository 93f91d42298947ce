//! Broker HTTP server
//!
//! The broker API (`/v2/...`, `/bluemix_v1/...`) sits behind Basic auth and
//! JSON content negotiation. The liveness page and the dashboard sign-on
//! routes are public; the sign-on routes are rate limited.

mod dashboard;
mod handlers;
pub mod logging_middleware;
pub mod negotiation;
pub mod rate_limit;
mod state;

pub use handlers::{ApiError, ApiResult, BrokerQuery};
pub use state::AppState;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use rsbroker_core::{BrokerConfig, LifecycleEngine, ServiceCatalog};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::basic_auth_middleware;
use crate::sso::DashboardSso;

pub struct BrokerServer {
    config: Arc<BrokerConfig>,
    state: AppState,
}

impl BrokerServer {
    /// Wire the engine and the sign-on clients behind one router
    pub fn new(
        config: Arc<BrokerConfig>,
        catalog: Arc<ServiceCatalog>,
        engine: LifecycleEngine,
    ) -> anyhow::Result<Self> {
        let sso = Arc::new(DashboardSso::new(config.clone())?);

        info!(
            service = %config.service_name,
            async_supported = config.async_supported,
            async_required = config.async_required,
            service_keys_supported = config.service_keys_supported,
            "[Broker] Initialized"
        );

        Ok(Self {
            state: AppState {
                config: config.clone(),
                catalog,
                engine,
                sso,
            },
            config,
        })
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        let state = self.state.clone();

        let api = Router::new()
            .route("/v2/catalog", get(handlers::catalog))
            .route(
                "/v2/service_instances/{instance_id}",
                put(handlers::provision)
                    .patch(handlers::update)
                    .delete(handlers::deprovision),
            )
            .route(
                "/v2/service_instances/{instance_id}/service_bindings/{binding_id}",
                put(handlers::bind).delete(handlers::unbind),
            )
            .route(
                "/v2/service_instances/{instance_id}/last_operation",
                get(handlers::last_operation),
            )
            .route(
                "/bluemix_v1/service_instances/{instance_id}",
                put(handlers::set_enablement).get(handlers::enablement),
            )
            // Authentication runs first, then negotiation
            .route_layer(middleware::from_fn(negotiation::json_negotiation_middleware))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                basic_auth_middleware,
            ));

        let rate_limiter = rate_limit::default_dashboard_rate_limiter();

        Router::new()
            .route("/", get(handlers::root))
            .route("/dashboard/{instance_id}", get(dashboard::dashboard))
            .route("/sso_dashboard", get(dashboard::sso_dashboard))
            .merge(api)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            // Request/Response logging with body (DEBUG level)
            .layer(middleware::from_fn(
                logging_middleware::http_logging_middleware,
            ))
            // The limiter extension must wrap the middleware that reads it
            .layer(middleware::from_fn(rate_limit::rate_limit_middleware))
            .layer(axum::Extension(rate_limiter))
    }

    /// Bind the configured address and serve until the process ends
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let router = self.router();

        info!(
            addr = %listener.local_addr()?,
            public_url = %self.config.public_url(),
            "[Broker] Ready to accept connections"
        );

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Start the server in the background
    pub fn spawn(self, listener: TcpListener) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.serve(listener).await })
    }
}
