//! Combines a resource's policy with the policies of its ancestors.

use std::collections::HashSet;
use std::iter;
use std::sync::Arc;

use authz_engine_sdk::{
    AuthorizationPolicy, CredentialRule, PolicyId, PrivilegeRule, ResourceId, ResourceRef,
    VerifiedCredentialRule,
};
use parking_lot::RwLock;
use tracing::{debug, error};

use super::cache::{TtlLruCache, VersionVector};
use super::error::DomainError;
use super::repo::PolicyRepository;
use crate::config::CacheConfig;

/// Transient union of a resource's policy and its ancestors' policies.
#[derive(Debug, Clone)]
pub struct EffectivePolicy {
    resource: ResourceRef,
    owner: Arc<AuthorizationPolicy>,
    /// Nearest parent first.
    ancestors: Vec<Arc<AuthorizationPolicy>>,
    versions: VersionVector,
}

impl EffectivePolicy {
    #[must_use]
    pub fn new(
        resource: ResourceRef,
        owner: Arc<AuthorizationPolicy>,
        ancestors: Vec<Arc<AuthorizationPolicy>>,
    ) -> Self {
        let mut versions = VersionVector::default();
        versions.push(owner.id, owner.version);
        for policy in &ancestors {
            versions.push(policy.id, policy.version);
        }
        Self {
            resource,
            owner,
            ancestors,
            versions,
        }
    }

    #[must_use]
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    #[must_use]
    pub fn owner(&self) -> &AuthorizationPolicy {
        &self.owner
    }

    #[must_use]
    pub fn versions(&self) -> &VersionVector {
        &self.versions
    }

    fn levels(&self) -> impl Iterator<Item = &AuthorizationPolicy> + '_ {
        iter::once(self.owner.as_ref()).chain(self.ancestors.iter().map(AsRef::as_ref))
    }

    /// Owner rules, plus the cascading rules of every ancestor.
    pub fn credential_rules(&self) -> impl Iterator<Item = (PolicyId, usize, &CredentialRule)> + '_ {
        self.levels().enumerate().flat_map(|(depth, policy)| {
            policy
                .rules
                .credential_rules
                .iter()
                .enumerate()
                .filter(move |(_, rule)| depth == 0 || rule.cascade)
                .map(move |(index, rule)| (policy.id, index, rule))
        })
    }

    pub fn privilege_rules(&self) -> impl Iterator<Item = (PolicyId, usize, &PrivilegeRule)> + '_ {
        self.levels().flat_map(|policy| {
            policy
                .rules
                .privilege_rules
                .iter()
                .enumerate()
                .map(move |(index, rule)| (policy.id, index, rule))
        })
    }

    pub fn verified_credential_rules(
        &self,
    ) -> impl Iterator<Item = (PolicyId, usize, &VerifiedCredentialRule)> + '_ {
        self.levels().flat_map(|policy| {
            policy
                .rules
                .verified_credential_rules
                .iter()
                .enumerate()
                .map(move |(index, rule)| (policy.id, index, rule))
        })
    }

    /// Nearest policy in the chain that opens the resource for anonymous reading.
    #[must_use]
    pub fn anonymous_read_policy(&self) -> Option<PolicyId> {
        self.levels()
            .find(|p| p.rules.anonymous_read_access)
            .map(|p| p.id)
    }
}

/// Loads policies through the repository, cache first, and builds
/// [`EffectivePolicy`] values.
///
/// A row read from the repository is only cached if no invalidation ran
/// while it was being loaded; otherwise a row read before a reset could
/// land in the cache after the reset cleared it.
pub struct PolicyAggregator {
    repo: Arc<dyn PolicyRepository>,
    policies: TtlLruCache<ResourceId, Arc<AuthorizationPolicy>>,
    /// Bumped by every invalidation.
    generation: RwLock<u64>,
    max_depth: usize,
}

impl PolicyAggregator {
    #[must_use]
    pub fn new(repo: Arc<dyn PolicyRepository>, max_depth: usize, cache: &CacheConfig) -> Self {
        Self {
            repo,
            policies: TtlLruCache::new(cache.max_entries, cache.ttl),
            generation: RwLock::new(0),
            max_depth,
        }
    }

    /// # Errors
    ///
    /// - [`DomainError::ContainmentCycle`] / [`DomainError::MaxDepthExceeded`] for a broken chain
    /// - [`DomainError::PolicyNotFound`] if a level has no policy
    /// - [`DomainError::InvalidPolicy`] if a level fails validation
    /// - [`DomainError::ResourceTypeMismatch`] if the owner is of another type
    /// - [`DomainError::Storage`] from the repository
    #[tracing::instrument(skip_all, fields(resource = %resource))]
    pub async fn aggregate(&self, resource: &ResourceRef) -> Result<EffectivePolicy, DomainError> {
        // One id past the limit is enough to tell that the chain is too deep.
        let chain = self
            .repo
            .load_ancestor_chain(resource.id, self.max_depth.saturating_add(1))
            .await?;
        self.check_chain(resource.id, &chain)?;

        let owner = self.load(resource.id).await?;
        if owner.resource_type != resource.resource_type {
            error!(
                resource_id = %resource.id,
                expected = %resource.resource_type,
                actual = %owner.resource_type,
                "policy resource type does not match request"
            );
            return Err(DomainError::ResourceTypeMismatch {
                resource_id: resource.id,
                expected: resource.resource_type,
                actual: owner.resource_type,
            });
        }

        let mut ancestors = Vec::with_capacity(chain.len());
        for id in chain {
            ancestors.push(self.load(id).await?);
        }
        debug!(levels = ancestors.len() + 1, "aggregated effective policy");
        Ok(EffectivePolicy::new(*resource, owner, ancestors))
    }

    fn check_chain(&self, resource_id: ResourceId, chain: &[ResourceId]) -> Result<(), DomainError> {
        let mut seen = HashSet::with_capacity(chain.len() + 1);
        seen.insert(resource_id);
        for id in chain {
            if !seen.insert(*id) {
                error!(%resource_id, repeated = %id, "containment cycle in ancestor chain");
                return Err(DomainError::ContainmentCycle(*id));
            }
        }
        if chain.len() > self.max_depth {
            error!(
                %resource_id,
                depth = chain.len(),
                max_depth = self.max_depth,
                "ancestor chain exceeds maximum depth"
            );
            return Err(DomainError::MaxDepthExceeded {
                resource_id,
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    async fn load(&self, resource_id: ResourceId) -> Result<Arc<AuthorizationPolicy>, DomainError> {
        if let Some(policy) = self.policies.get(&resource_id) {
            return Ok(policy);
        }

        let generation = *self.generation.read();
        let policy = self
            .repo
            .load_policy(resource_id)
            .await?
            .ok_or(DomainError::PolicyNotFound(resource_id))?;

        if policy.resource_id != resource_id {
            error!(
                %resource_id,
                owner = %policy.resource_id,
                "policy row belongs to another resource"
            );
            return Err(DomainError::InvalidPolicy {
                resource_id,
                reason: format!("policy {} is owned by {}", policy.id, policy.resource_id),
            });
        }
        if let Err(e) = policy.validate() {
            error!(%resource_id, policy_id = %policy.id, error = %e, "invalid authorization policy");
            return Err(DomainError::InvalidPolicy {
                resource_id,
                reason: e.to_string(),
            });
        }

        let policy = Arc::new(policy);
        let current = self.generation.read();
        if *current == generation {
            self.policies.insert(resource_id, Arc::clone(&policy));
        } else {
            debug!(%resource_id, "policy invalidated while loading, not caching the row");
        }
        Ok(policy)
    }

    /// Forget the cached row of `policy_id` and refuse to cache rows whose
    /// load started before this call.
    pub fn invalidate(&self, policy_id: PolicyId) {
        let mut generation = self.generation.write();
        *generation = generation.wrapping_add(1);
        self.policies.retain(|_, policy| policy.id != policy_id);
    }
}
