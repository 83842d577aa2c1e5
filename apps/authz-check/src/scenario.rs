//! YAML description of a resource tree plus the optional remote evaluator.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use authz_engine::InMemoryPolicyStore;
use authz_engine_sdk::{AuthorizationPolicy, PolicyRules, ResourceId, ResourceRef, ResourceType};
use figment::Figment;
use figment::providers::{Format, Yaml};
use serde::Deserialize;
use static_evaluator_plugin::config::StaticEvaluatorConfig;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Parents must be listed before their children.
    pub resources: Vec<ResourceEntry>,

    /// Static evaluator answering remote evaluations, if remote evaluation is enabled.
    #[serde(default)]
    pub remote: Option<StaticEvaluatorConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    pub id: ResourceId,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub parent: Option<ResourceId>,
    /// Missing means the resource has no policy row.
    #[serde(default)]
    pub policy: Option<PolicyRules>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        Figment::from(Yaml::file(path))
            .extract()
            .with_context(|| format!("failed to read scenario {}", path.display()))
    }

    pub fn store(&self) -> Result<Arc<InMemoryPolicyStore>> {
        let store = InMemoryPolicyStore::new();
        for entry in &self.resources {
            let resource = ResourceRef::new(entry.id, entry.resource_type);
            let inserted = match &entry.policy {
                Some(rules) => store
                    .insert(
                        AuthorizationPolicy::new(entry.id, entry.resource_type)
                            .with_rules(rules.clone()),
                        entry.parent,
                    )
                    .map(|_| ()),
                None => store.insert_without_policy(resource, entry.parent),
            };
            inserted.with_context(|| format!("cannot add resource {resource}"))?;
        }
        tracing::debug!(resources = store.len(), "scenario loaded");
        Ok(Arc::new(store))
    }

    pub fn resource(&self, id: ResourceId) -> Result<ResourceRef> {
        self.resources
            .iter()
            .find(|r| r.id == id)
            .map(|r| ResourceRef::new(r.id, r.resource_type))
            .with_context(|| format!("resource {id} is not part of the scenario"))
    }
}
