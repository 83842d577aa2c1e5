//! Policy Enforcement Point (`PEP`) object.
//!
//! [`PolicyEnforcer`] turns engine decisions into control flow: a request
//! either proceeds or fails with a forbidden / unavailable error.
//!
//! Constructed once during service initialisation with the engine client
//! and the operation requirement table; cheap to clone.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use authz_security::{ActorContext, ResourceId};

use crate::api::AuthzEngineClient;
use crate::error::AuthzEngineError;
use crate::models::{DenyReason, ResourceRef};
use crate::pep::operations::OperationRequirements;
use crate::policy::PolicyId;
use crate::privilege::Privilege;

/// Error from the PEP enforcement flow.
#[derive(Debug, thiserror::Error)]
pub enum EnforcerError {
    /// The actor lacks the privilege.
    #[error("'{privilege}' on {resource_id} denied")]
    Forbidden {
        privilege: Privilege,
        resource_id: ResourceId,
        policy_id: Option<PolicyId>,
        deny_reason: Option<DenyReason>,
    },

    /// The engine could not produce a decision.
    #[error("authorization evaluation failed: {0}")]
    EvaluationFailed(#[from] AuthzEngineError),

    /// The operation has no registered requirement.
    #[error("operation '{0}' has no registered privilege requirement")]
    UnregisteredOperation(String),
}

impl EnforcerError {
    /// Retry hint when the failure is transient.
    #[must_use]
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::EvaluationFailed(e) => e.retry_after_ms(),
            _ => None,
        }
    }

    fn from_engine(e: AuthzEngineError) -> Self {
        match e {
            AuthzEngineError::Forbidden {
                privilege,
                resource_id,
                policy_id,
                reason,
            } => Self::Forbidden {
                privilege,
                resource_id,
                policy_id,
                deny_reason: Some(reason),
            },
            other => Self::EvaluationFailed(other),
        }
    }
}

/// Policy Enforcement Point.
///
/// # Example
///
/// ```ignore
/// let enforcer = PolicyEnforcer::new(engine.clone()).with_operations(
///     OperationRequirements::new().require("space.update", Privilege::Update),
/// );
///
/// enforcer.enforce(&actor, &space, Privilege::Read).await?;
/// let updated = enforcer
///     .intercept("space.update", &actor, &space, || repo.update(space_id, patch))
///     .await?;
/// ```
#[derive(Clone)]
pub struct PolicyEnforcer {
    engine: Arc<dyn AuthzEngineClient>,
    operations: Arc<OperationRequirements>,
}

impl PolicyEnforcer {
    pub fn new(engine: Arc<dyn AuthzEngineClient>) -> Self {
        Self {
            engine,
            operations: Arc::new(OperationRequirements::default()),
        }
    }

    #[must_use]
    pub fn with_operations(mut self, operations: OperationRequirements) -> Self {
        self.operations = Arc::new(operations);
        self
    }

    /// Succeed if `actor` holds `privilege` on `resource`.
    ///
    /// # Errors
    ///
    /// - [`EnforcerError::Forbidden`] on deny, carrying the policy and reason
    /// - [`EnforcerError::EvaluationFailed`] if no decision could be made
    pub async fn enforce(
        &self,
        actor: &ActorContext,
        resource: &ResourceRef,
        privilege: Privilege,
    ) -> Result<(), EnforcerError> {
        let decision = self
            .engine
            .evaluate(actor, resource, privilege)
            .await
            .map_err(EnforcerError::from_engine)?;

        if decision.granted {
            return Ok(());
        }
        Err(EnforcerError::Forbidden {
            privilege,
            resource_id: resource.id,
            policy_id: decision.policy_id,
            deny_reason: decision.deny_reason,
        })
    }

    /// Boolean form of [`Self::enforce`] for conditional UI or field-level checks.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures; every kind of deny maps to `Ok(false)`.
    pub async fn resolve(
        &self,
        actor: &ActorContext,
        resource: &ResourceRef,
        privilege: Privilege,
    ) -> Result<bool, EnforcerError> {
        match self.enforce(actor, resource, privilege).await {
            Ok(()) => Ok(true),
            Err(EnforcerError::Forbidden { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// All privileges `actor` holds on `resource`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::enforce`].
    pub async fn granted_privileges(
        &self,
        actor: &ActorContext,
        resource: &ResourceRef,
    ) -> Result<BTreeSet<Privilege>, EnforcerError> {
        self.engine
            .granted_privileges(actor, resource)
            .await
            .map_err(EnforcerError::from_engine)
    }

    /// Enforce the requirement registered for `operation`, then run `handler`.
    ///
    /// The handler is not polled unless access is granted.
    ///
    /// # Errors
    ///
    /// - [`EnforcerError::UnregisteredOperation`] if `operation` is not in the table
    /// - any error of [`Self::enforce`]
    pub async fn intercept<F, Fut, T>(
        &self,
        operation: &str,
        actor: &ActorContext,
        resource: &ResourceRef,
        handler: F,
    ) -> Result<T, EnforcerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(privilege) = self.operations.required_privilege(operation) else {
            tracing::warn!(operation, "rejecting call to unregistered operation");
            return Err(EnforcerError::UnregisteredOperation(operation.to_owned()));
        };
        self.enforce(actor, resource, privilege).await?;
        Ok(handler().await)
    }
}
