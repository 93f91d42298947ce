//! Broker configuration
//!
//! Built once at process start and passed explicitly to every component.
//! Nothing in here changes at runtime.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use zeroize::Zeroizing;

/// Default service name; must be unique among the platform's service offerings
pub const DEFAULT_SERVICE_NAME: &str = "testrustresourceservicebrokername";

/// Default port when `PORT` is not set
pub const DEFAULT_PORT: u16 = 3000;

/// Default IAM endpoint
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.cloud.ibm.com";

/// Grant type for exchanging an API key for an access token
pub const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

#[derive(Clone)]
pub struct BrokerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Externally visible base URL (dashboard links, SSO redirect)
    pub public_url: Option<String>,
    /// Service offering name, also the OAuth client id by default
    pub service_name: String,
    /// Basic auth user the platform presents
    pub broker_user: String,
    pub broker_password: Zeroizing<String>,
    /// OAuth client registered with the identity provider
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    /// API key used to call the policy endpoint
    pub api_key: Zeroizing<String>,
    /// Whether asynchronous operations are supported
    pub async_supported: bool,
    /// Whether asynchronous operation is mandatory
    pub async_required: bool,
    /// Whether bindings without an application (service keys) are allowed
    pub service_keys_supported: bool,
    /// Identity / policy provider base URL
    pub iam_endpoint: String,
    /// Bound on every outbound identity/policy call
    pub upstream_timeout: Duration,
    /// Optional JSON catalog replacing the built-in offering
    pub catalog_path: Option<PathBuf>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            public_url: None,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            broker_user: "TestServiceBrokerUser".to_string(),
            broker_password: Zeroizing::new("TestServiceBrokerPassword".to_string()),
            client_id: DEFAULT_SERVICE_NAME.to_string(),
            client_secret: Zeroizing::new(String::new()),
            api_key: Zeroizing::new(String::new()),
            async_supported: false,
            async_required: false,
            service_keys_supported: true,
            iam_endpoint: DEFAULT_IAM_ENDPOINT.to_string(),
            upstream_timeout: Duration::from_secs(10),
            catalog_path: None,
        }
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("public_url", &self.public_url)
            .field("service_name", &self.service_name)
            .field("broker_user", &self.broker_user)
            .field("broker_password", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_key", &"[REDACTED]")
            .field("async_supported", &self.async_supported)
            .field("async_required", &self.async_required)
            .field("service_keys_supported", &self.service_keys_supported)
            .field("iam_endpoint", &self.iam_endpoint)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("catalog_path", &self.catalog_path)
            .finish()
    }
}

impl BrokerConfig {
    /// Build from process environment (call after `.env` has been loaded)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, starting from the defaults
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
        }
        if let Some(host) = lookup("BROKER_HOST") {
            config.host = host;
        }
        if let Some(url) = lookup("BROKER_PUBLIC_URL") {
            config.public_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(name) = lookup("BROKER_SERVICE_NAME") {
            config.client_id = name.clone();
            config.service_name = name;
        }
        if let Some(user) = lookup("BROKER_USER") {
            config.broker_user = user;
        }
        if let Some(password) = lookup("BROKER_PASSWORD") {
            config.broker_password = Zeroizing::new(password);
        }
        if let Some(client_id) = lookup("BROKER_CLIENT_ID") {
            config.client_id = client_id;
        }
        if let Some(secret) = lookup("BROKER_CLIENT_SECRET") {
            config.client_secret = Zeroizing::new(secret);
        }
        if let Some(api_key) = lookup("BROKER_API_KEY") {
            config.api_key = Zeroizing::new(api_key);
        }
        if let Some(flag) = lookup("BROKER_ASYNC_SUPPORTED") {
            config.async_supported = parse_flag("BROKER_ASYNC_SUPPORTED", &flag)?;
        }
        if let Some(flag) = lookup("BROKER_ASYNC_REQUIRED") {
            config.async_required = parse_flag("BROKER_ASYNC_REQUIRED", &flag)?;
        }
        if let Some(flag) = lookup("BROKER_SERVICE_KEYS_SUPPORTED") {
            config.service_keys_supported = parse_flag("BROKER_SERVICE_KEYS_SUPPORTED", &flag)?;
        }
        if let Some(endpoint) = lookup("BROKER_IAM_ENDPOINT") {
            config.iam_endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup("BROKER_UPSTREAM_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().with_context(|| {
                format!("BROKER_UPSTREAM_TIMEOUT_SECS must be an integer, got '{}'", secs)
            })?;
            anyhow::ensure!(secs > 0, "BROKER_UPSTREAM_TIMEOUT_SECS must be positive");
            config.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup("BROKER_CATALOG_PATH") {
            config.catalog_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Socket address to bind
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    /// Externally visible base URL, without trailing slash
    pub fn public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.clone(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    /// Dashboard link for an instance; stable for the life of the instance
    pub fn dashboard_url(&self, instance_id: &str) -> String {
        format!(
            "{}/dashboard/{}",
            self.public_url(),
            urlencoding::encode(instance_id)
        )
    }

    /// Where the identity provider sends the browser back to
    pub fn sso_redirect_uri(&self) -> String {
        format!("{}/sso_dashboard", self.public_url())
    }

    /// OpenID configuration document of the identity provider
    pub fn identity_configuration_url(&self) -> String {
        format!(
            "{}/identity/.well-known/openid-configuration",
            self.iam_endpoint
        )
    }

    /// Token endpoint for the API key grant
    pub fn api_key_token_url(&self) -> String {
        format!("{}/identity/token", self.iam_endpoint)
    }

    /// Policy decision endpoint
    pub fn authz_url(&self) -> String {
        format!("{}/v2/authz", self.iam_endpoint)
    }

    /// Policy action checked before showing the dashboard
    pub fn dashboard_action(&self) -> String {
        format!("{}.dashboard.view", self.service_name)
    }

    /// Async-only service: callers must accept incomplete responses
    pub fn requires_async(&self) -> bool {
        self.async_supported && self.async_required
    }
}

fn parse_flag(name: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => anyhow::bail!("{} must be true or false, got '{}'", name, other),
    }
}
