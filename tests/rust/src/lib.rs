//! Shared test utilities and fixtures for broker integration tests.

use std::sync::{Arc, Once};

use reqwest::{Method, RequestBuilder};
use rsbroker_core::{
    BrokerConfig, DefaultBackend, InMemoryInstanceRepository, LifecycleEngine, ServiceBackend,
    ServiceCatalog,
};
use rsbroker_gateway::BrokerServer;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Mock backends
pub mod mocks;
pub use mocks::{FailingBackend, GatedBackend};

pub use iam::MockIam;


static TRACING: Once = Once::new();

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A broker served on an ephemeral localhost port
pub struct TestBroker {
    pub base_url: String,
    pub config: Arc<BrokerConfig>,
    pub client: reqwest::Client,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestBroker {
    pub async fn start(config: BrokerConfig) -> Self {
        Self::start_with_backend(config, Arc::new(DefaultBackend)).await
    }

    pub async fn start_with_backend(
        mut config: BrokerConfig,
        backend: Arc<dyn ServiceBackend>,
    ) -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        if config.public_url.is_none() {
            config.public_url = Some(base_url.clone());
        }

        let config = Arc::new(config);
        let catalog = Arc::new(ServiceCatalog::from_config(&config).unwrap());
        let engine = LifecycleEngine::new(
            config.clone(),
            catalog.clone(),
            Arc::new(InMemoryInstanceRepository::new()),
            backend,
        );
        let server = BrokerServer::new(config.clone(), catalog, engine).unwrap();
        let handle = server.spawn(listener);

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            base_url,
            config,
            client,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Unauthenticated request
    pub fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Request carrying the broker's Basic credentials
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.anonymous(method, path).basic_auth(
            &self.config.broker_user,
            Some(self.config.broker_password.as_str()),
        )
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Send and return status plus JSON body (`Null` for an empty body)
pub async fn send_json(request: RequestBuilder) -> (u16, serde_json::Value) {
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    let text = response.text().await.unwrap();
    let body = if text.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&text).unwrap()
    };
    (status, body)
}
