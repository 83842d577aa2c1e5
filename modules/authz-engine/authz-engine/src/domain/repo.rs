use async_trait::async_trait;
use authz_engine_sdk::{AuthorizationPolicy, PolicyRules, ResourceId};

use super::error::DomainError;

/// Persistence of authorization policies and the containment tree.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn load_policy(
        &self,
        resource_id: ResourceId,
    ) -> Result<Option<AuthorizationPolicy>, DomainError>;

    /// Ancestors of `resource_id`, nearest parent first, root last.
    ///
    /// Implementations return at most `limit` ids. They stop walking when
    /// they meet an id a second time and include that id, so the caller can
    /// report the cycle.
    async fn load_ancestor_chain(
        &self,
        resource_id: ResourceId,
        limit: usize,
    ) -> Result<Vec<ResourceId>, DomainError>;

    /// Replace the rules of `resource_id` if its policy is still at
    /// `expected_version`; the stored policy gets `expected_version + 1`.
    async fn store_rules(
        &self,
        resource_id: ResourceId,
        expected_version: u64,
        rules: PolicyRules,
    ) -> Result<AuthorizationPolicy, DomainError>;
}

/// Recomputes the rules of a policy from current business state.
#[async_trait]
pub trait PolicyRuleSource: Send + Sync {
    async fn compute_rules(&self, current: &AuthorizationPolicy)
    -> Result<PolicyRules, DomainError>;
}
