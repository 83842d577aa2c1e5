//! Domain service for the authorization engine.

use std::collections::BTreeSet;
use std::sync::Arc;

use authz_engine_sdk::{
    ActorContext, AuthorizationPolicy, Decision, DecisionSource, Privilege, ResourceId,
    ResourceRef,
};
use tracing::{debug, info, warn};

use super::aggregator::{EffectivePolicy, PolicyAggregator};
use super::cache::{DecisionCache, DecisionKey};
use super::error::DomainError;
use super::remote::RemoteEvaluator;
use super::repo::{PolicyRepository, PolicyRuleSource};
use super::reset::PolicyResetter;
use super::resolver;
use crate::config::{AuthzEngineConfig, FallbackMode, RemoteConfig};

/// Authorization engine service.
pub struct Service {
    aggregator: PolicyAggregator,
    decisions: DecisionCache,
    remote: Option<RemoteEvaluator>,
    remote_config: RemoteConfig,
    enforcement_enabled: bool,
    resetter: PolicyResetter,
}

impl Service {
    #[must_use]
    pub fn new(
        config: &AuthzEngineConfig,
        repo: Arc<dyn PolicyRepository>,
        rule_source: Arc<dyn PolicyRuleSource>,
        remote: Option<RemoteEvaluator>,
    ) -> Self {
        Self {
            aggregator: PolicyAggregator::new(
                Arc::clone(&repo),
                config.aggregation.max_depth,
                &config.cache,
            ),
            decisions: DecisionCache::new(config.cache.max_entries, config.cache.ttl),
            remote,
            remote_config: config.remote.clone(),
            enforcement_enabled: config.enforcement_enabled,
            resetter: PolicyResetter::new(repo, rule_source),
        }
    }

    #[must_use]
    pub fn remote(&self) -> Option<&RemoteEvaluator> {
        self.remote.as_ref()
    }

    /// Decide whether `actor` holds `privilege` on `resource`.
    ///
    /// # Errors
    ///
    /// - Aggregation errors (broken chain, missing or invalid policy, storage)
    /// - [`DomainError::RemoteUnavailable`] when the remote evaluator fails
    ///   and the fallback mode is `deny`
    #[tracing::instrument(skip_all, fields(resource = %resource, privilege = %privilege))]
    pub async fn evaluate(
        &self,
        actor: &ActorContext,
        resource: &ResourceRef,
        privilege: Privilege,
    ) -> Result<Decision, DomainError> {
        if !self.enforcement_enabled {
            debug!("enforcement disabled, granting");
            return Ok(Decision::allow(privilege, DecisionSource::EnforcementDisabled));
        }

        let effective = self.aggregator.aggregate(resource).await?;
        let key = DecisionKey {
            credentials: actor.credential_key(),
            resource_id: resource.id,
            privilege,
            versions: effective.versions().clone(),
        };

        let decision = self
            .decisions
            .get_or_compute(key, || self.decide(actor, &effective, privilege))
            .await?;
        debug!(
            granted = decision.granted,
            source = ?decision.source,
            "authorization decision"
        );
        Ok(decision)
    }

    async fn decide(
        &self,
        actor: &ActorContext,
        effective: &EffectivePolicy,
        privilege: Privilege,
    ) -> Result<Decision, DomainError> {
        let resource = effective.resource();
        let remote = self
            .remote
            .as_ref()
            .filter(|_| self.remote_config.applies_to(resource.resource_type));
        let Some(remote) = remote else {
            return Ok(resolver::resolve(actor, effective, privilege));
        };

        match remote.evaluate(actor, resource, privilege).await {
            Ok(decision) => Ok(decision.with_policy(effective.owner().id)),
            Err(failure) => match self.remote_config.fallback {
                FallbackMode::Local => {
                    warn!(
                        resource = %resource,
                        code = %failure.code(),
                        "remote evaluator unavailable, falling back to local resolution"
                    );
                    Ok(resolver::resolve(actor, effective, privilege)
                        .with_source(DecisionSource::LocalFallback))
                }
                FallbackMode::Deny => Err(failure.into()),
            },
        }
    }

    /// Every privilege `actor` holds on `resource`, resolved locally.
    ///
    /// # Errors
    ///
    /// Aggregation errors, as for [`Service::evaluate`].
    #[tracing::instrument(skip_all, fields(resource = %resource))]
    pub async fn granted_privileges(
        &self,
        actor: &ActorContext,
        resource: &ResourceRef,
    ) -> Result<BTreeSet<Privilege>, DomainError> {
        if !self.enforcement_enabled {
            debug!("enforcement disabled, granting every privilege");
            return Ok(Privilege::ALL.iter().copied().collect());
        }
        let effective = self.aggregator.aggregate(resource).await?;
        Ok(resolver::granted_privileges(actor, &effective))
    }

    /// Recompute and store the policy of `resource_id`, then drop every
    /// cached row and decision that depended on the old version.
    ///
    /// # Errors
    ///
    /// See [`PolicyResetter::reset`].
    #[tracing::instrument(skip_all, fields(resource_id = %resource_id))]
    pub async fn reset_policy(
        &self,
        resource_id: ResourceId,
    ) -> Result<AuthorizationPolicy, DomainError> {
        let policy = self.resetter.reset(resource_id).await?;
        self.aggregator.invalidate(policy.id);
        self.decisions.invalidate(policy.id);
        info!(
            policy_id = %policy.id,
            version = policy.version,
            cached_decisions = self.decisions.len(),
            "caches invalidated after policy reset"
        );
        Ok(policy)
    }
}
