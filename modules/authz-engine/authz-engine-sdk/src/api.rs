//! Public API trait for the authorization engine.

use std::collections::BTreeSet;

use async_trait::async_trait;
use authz_security::{ActorContext, ResourceId};

use crate::error::AuthzEngineError;
use crate::models::{Decision, ResourceRef};
use crate::privilege::Privilege;

/// Public API trait for the authorization engine.
///
/// Consumed by the API layer through [`crate::pep::PolicyEnforcer`] and by
/// business services that need to rewrite a policy:
///
/// ```ignore
/// let decision = engine.evaluate(&actor, &space, Privilege::Update).await?;
/// let version = engine.reset_policy(space.id).await?;
/// ```
#[async_trait]
pub trait AuthzEngineClient: Send + Sync {
    /// Decide whether `actor` holds `privilege` on `resource`.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if the policy chain is broken or invalid (fail closed)
    /// - `Unavailable` if the remote evaluator is down and fallback is `deny`
    /// - `Internal` for unexpected errors
    async fn evaluate(
        &self,
        actor: &ActorContext,
        resource: &ResourceRef,
        privilege: Privilege,
    ) -> Result<Decision, AuthzEngineError>;

    /// Every privilege `actor` holds on `resource`, resolved locally.
    ///
    /// # Errors
    ///
    /// Same as [`AuthzEngineClient::evaluate`]; a `Forbidden` names `read`
    /// as its privilege. The remote evaluator is never consulted, so
    /// `Unavailable` only reports storage failures.
    async fn granted_privileges(
        &self,
        actor: &ActorContext,
        resource: &ResourceRef,
    ) -> Result<BTreeSet<Privilege>, AuthzEngineError>;

    /// Recompute the policy of `resource_id` and return its new version.
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` if the resource has no policy
    /// - `InvalidPolicy` if the recomputed rules fail validation
    /// - `VersionConflict` if a concurrent reset won the write
    async fn reset_policy(&self, resource_id: ResourceId) -> Result<u64, AuthzEngineError>;
}
