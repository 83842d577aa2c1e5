//! Local (in-process) client for the authorization engine.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use authz_engine_sdk::{
    ActorContext, AuthzEngineClient, AuthzEngineError, Decision, Privilege, ResourceId,
    ResourceRef,
};

use super::{DomainError, Service};

/// Local client wrapping the service.
pub struct AuthzEngineLocalClient {
    svc: Arc<Service>,
}

impl AuthzEngineLocalClient {
    #[must_use]
    pub fn new(svc: Arc<Service>) -> Self {
        Self { svc }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> AuthzEngineError {
    tracing::error!(operation = op, error = ?e, "authz_engine call failed");
    e.into()
}

/// Data errors fail closed as a forbidden outcome; everything else is
/// reported as is.
fn log_and_deny(
    op: &str,
    e: DomainError,
    privilege: Privilege,
    resource_id: ResourceId,
) -> AuthzEngineError {
    if e.data_deny_code().is_some() {
        tracing::error!(operation = op, error = ?e, %resource_id, "denied on broken policy data");
        e.into_evaluation_error(privilege, resource_id)
    } else {
        log_and_convert(op, e)
    }
}

#[async_trait]
impl AuthzEngineClient for AuthzEngineLocalClient {
    async fn evaluate(
        &self,
        actor: &ActorContext,
        resource: &ResourceRef,
        privilege: Privilege,
    ) -> Result<Decision, AuthzEngineError> {
        self.svc
            .evaluate(actor, resource, privilege)
            .await
            .map_err(|e| log_and_deny("evaluate", e, privilege, resource.id))
    }

    async fn granted_privileges(
        &self,
        actor: &ActorContext,
        resource: &ResourceRef,
    ) -> Result<BTreeSet<Privilege>, AuthzEngineError> {
        self.svc
            .granted_privileges(actor, resource)
            .await
            // Listing privileges reveals what the actor may read about the resource.
            .map_err(|e| log_and_deny("granted_privileges", e, Privilege::Read, resource.id))
    }

    async fn reset_policy(&self, resource_id: ResourceId) -> Result<u64, AuthzEngineError> {
        self.svc
            .reset_policy(resource_id)
            .await
            .map(|policy| policy.version)
            .map_err(|e| log_and_convert("reset_policy", e))
    }
}
