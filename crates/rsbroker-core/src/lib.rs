//! # Resource Broker Core Library
//!
//! Domain logic, entities, and business rules for the resource service broker.
//!
//! ## Modules
//!
//! - `config` - Immutable broker configuration (credentials, async flags, IAM endpoint)
//! - `domain` - Core entities (catalog, instance, binding, async operation, identity)
//! - `error` - Error taxonomy shared by the engine and the HTTP surface
//! - `validation` - JSON payload field extraction and type checking
//! - `repository` - Instance/binding storage trait and in-memory store
//! - `service` - Lifecycle engine, async operation tracker, backend contract

pub mod config;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;
pub mod validation;

// Re-export commonly used types
pub use config::BrokerConfig;
pub use domain::*;
pub use error::{BrokerError, BrokerResult};
pub use repository::*;
pub use service::*;
pub use validation::ValidationError;
