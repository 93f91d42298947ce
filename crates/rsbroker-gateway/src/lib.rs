//! Resource Broker Gateway
//!
//! HTTP surface of the resource service broker:
//! - Broker API routes with Basic auth and JSON content negotiation
//! - Dashboard single sign-on against the identity provider
//! - Authorization decisions from the policy endpoint
//! - Request logging with trace ids, rate limiting of browser routes

pub mod auth;
pub mod authz;
pub mod logging;
pub mod oauth;
pub mod server;
pub mod sso;

pub use auth::BasicCredentials;
pub use authz::AuthorizationDecisionClient;
pub use oauth::{AccessTokenClaims, IdentityDiscovery, TokenExchangeClient, UpstreamClient};
pub use server::{AppState, BrokerServer};
pub use sso::{DashboardSso, SsoOutcome};
