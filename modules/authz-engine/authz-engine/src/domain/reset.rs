//! Policy reset: the only path that mutates a stored policy.

use std::sync::Arc;

use async_trait::async_trait;
use authz_engine_sdk::{AuthorizationPolicy, PolicyRules, ResourceId};
use tracing::{error, info};

use super::error::DomainError;
use super::repo::{PolicyRepository, PolicyRuleSource};

/// Rule source that keeps the stored rules and only bumps the version.
///
/// Used when no business-state source is wired; a reset then still
/// revalidates the policy and invalidates every cached decision built on it.
pub struct CurrentRules;

#[async_trait]
impl PolicyRuleSource for CurrentRules {
    async fn compute_rules(
        &self,
        current: &AuthorizationPolicy,
    ) -> Result<PolicyRules, DomainError> {
        Ok(current.rules.clone())
    }
}

pub struct PolicyResetter {
    repo: Arc<dyn PolicyRepository>,
    source: Arc<dyn PolicyRuleSource>,
}

impl PolicyResetter {
    #[must_use]
    pub fn new(repo: Arc<dyn PolicyRepository>, source: Arc<dyn PolicyRuleSource>) -> Self {
        Self { repo, source }
    }

    /// Recompute, validate and store the rules of `resource_id`.
    ///
    /// Returns the stored policy, whose version is one above the version read.
    ///
    /// # Errors
    ///
    /// - [`DomainError::PolicyNotFound`] if the resource has no policy
    /// - [`DomainError::InvalidPolicy`] if the recomputed rules fail validation;
    ///   nothing is written in that case
    /// - [`DomainError::VersionConflict`] if another reset won the race
    pub async fn reset(&self, resource_id: ResourceId) -> Result<AuthorizationPolicy, DomainError> {
        let current = self
            .repo
            .load_policy(resource_id)
            .await?
            .ok_or(DomainError::PolicyNotFound(resource_id))?;

        let rules = self.source.compute_rules(&current).await?;
        let candidate = current.clone().with_rules(rules);
        if let Err(e) = candidate.validate() {
            error!(%resource_id, policy_id = %current.id, error = %e, "recomputed rules are invalid");
            return Err(DomainError::InvalidPolicy {
                resource_id,
                reason: e.to_string(),
            });
        }

        let stored = self
            .repo
            .store_rules(resource_id, current.version, candidate.rules)
            .await?;
        info!(
            %resource_id,
            policy_id = %stored.id,
            version = stored.version,
            "authorization policy reset"
        );
        Ok(stored)
    }
}
