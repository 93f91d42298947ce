//! Service catalog - the offerings and plans advertised at `/v2/catalog`
//!
//! Built once at startup and never mutated. A loaded document is served
//! exactly as written; the typed offerings are only a lookup view over it.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::config::BrokerConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCatalog {
    pub services: Vec<ServiceOffering>,
    document: Value,
}

#[derive(Deserialize)]
struct CatalogView {
    services: Vec<ServiceOffering>,
}

impl Serialize for ServiceCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.document.serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOffering {
    pub id: String,
    pub name: String,
    pub description: String,
    pub bindable: bool,
    #[serde(default)]
    pub plan_updateable: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ServiceMetadata>,
    pub plans: Vec<ServicePlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePlan {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default = "default_true")]
    pub free: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bindable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PlanMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Service id of the built-in offering
pub const DEFAULT_SERVICE_ID: &str = "df35cab6-347b-4ba5-8f39-e9c23a237f5b";

/// Plan id of the built-in "lite" plan
pub const DEFAULT_PLAN_ID: &str = "2a1d139b-1b05-4e33-b72e-a1f8c14be559";

impl ServiceCatalog {
    /// Catalog from configuration: the JSON file if one is configured,
    /// otherwise the built-in offering
    pub fn from_config(config: &BrokerConfig) -> anyhow::Result<Self> {
        match &config.catalog_path {
            Some(path) => Self::load(path),
            None => Ok(Self::builtin(config)),
        }
    }

    /// Load a catalog document from disk
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let document: Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid catalog {}", path.display()))?;
        Self::from_document(document).with_context(|| format!("Invalid catalog {}", path.display()))
    }

    /// Catalog over a raw `/v2/catalog` document. Fields the broker does not
    /// interpret are kept and served unchanged.
    pub fn from_document(document: Value) -> anyhow::Result<Self> {
        let view = CatalogView::deserialize(&document)?;
        anyhow::ensure!(!view.services.is_empty(), "Catalog has no services");
        Ok(Self {
            services: view.services,
            document,
        })
    }

    /// The document returned by `/v2/catalog`
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Single bindable offering with one free plan
    pub fn builtin(config: &BrokerConfig) -> Self {
        let base = format!("{}/", config.public_url());

        let services = vec![ServiceOffering {
            id: DEFAULT_SERVICE_ID.to_string(),
            name: config.service_name.clone(),
            description: "Test Rust Resource Service Broker Description".to_string(),
            bindable: true,
            plan_updateable: true,
            tags: vec!["lite".to_string(), "tag1a".to_string(), "tag1b".to_string()],
            metadata: Some(ServiceMetadata {
                display_name: Some("Test Rust Resource Service Broker Display Name".to_string()),
                documentation_url: Some(format!("{}documentation.html", base)),
                image_url: Some(format!("{}services.svg", base)),
                instructions_url: Some(format!("{}instructions.html", base)),
                long_description: Some(
                    "Test Rust Resource Service Broker Long Description".to_string(),
                ),
                provider_display_name: Some("Company Name".to_string()),
                support_url: Some(format!("{}support.html", base)),
                terms_url: Some(format!("{}terms.html", base)),
            }),
            plans: vec![ServicePlan {
                id: DEFAULT_PLAN_ID.to_string(),
                name: "lite".to_string(),
                description: "Test Rust Resource Service Broker Plan Description".to_string(),
                free: true,
                bindable: Some(true),
                metadata: Some(PlanMetadata {
                    bullets: vec!["Test bullet 1".to_string(), "Test bullet 2".to_string()],
                    display_name: Some("Lite".to_string()),
                }),
            }],
        }];
        let document = serde_json::json!({ "services": &services });
        Self { services, document }
    }

    pub fn service(&self, service_id: &str) -> Option<&ServiceOffering> {
        self.services.iter().find(|s| s.id == service_id)
    }
}

impl ServiceOffering {
    pub fn plan(&self, plan_id: &str) -> Option<&ServicePlan> {
        self.plans.iter().find(|p| p.id == plan_id)
    }
}
