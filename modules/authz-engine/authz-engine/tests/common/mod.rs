#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use authz_engine::domain::{DomainError, PolicyRepository, PolicyRuleSource};
use authz_engine::{AuthzEngineConfig, InMemoryPolicyStore};
use authz_engine_sdk::{
    ActorContext, AuthorizationPolicy, CredentialDefinition, CredentialRule, CredentialType,
    PolicyRules, Privilege, PrivilegeRule, RemoteEvaluationRequest, RemoteEvaluationResponse,
    RemoteEvaluatorClient, RemoteTransportError, ResourceId, ResourceRef, ResourceType,
};
use parking_lot::Mutex;

/// account -> space -> callout, each with its own policy.
pub struct Tree {
    pub store: Arc<InMemoryPolicyStore>,
    pub account: ResourceRef,
    pub space: ResourceRef,
    pub callout: ResourceRef,
}

pub fn space_rules(space: ResourceId) -> PolicyRules {
    PolicyRules {
        credential_rules: vec![
            CredentialRule::new(
                "space-members-read",
                [CredentialDefinition::scoped(CredentialType::SpaceMember, space)],
                [Privilege::Read],
            ),
            CredentialRule::new(
                "space-admins-update",
                [CredentialDefinition::scoped(CredentialType::SpaceAdmin, space)],
                [Privilege::Update],
            ),
            CredentialRule::new(
                "space-leads-grant",
                [CredentialDefinition::scoped(CredentialType::SpaceLead, space)],
                [Privilege::Grant],
            )
            .non_cascading(),
        ],
        privilege_rules: vec![PrivilegeRule::new(
            "update-implies-read",
            Privilege::Update,
            [Privilege::Read],
        )],
        ..PolicyRules::default()
    }
}

impl Tree {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryPolicyStore::new());

        let account = store
            .insert(
                AuthorizationPolicy::new(ResourceId::new_v4(), ResourceType::Account).with_rules(
                    PolicyRules {
                        credential_rules: vec![CredentialRule::new(
                            "global-admins",
                            [CredentialDefinition::global(CredentialType::GlobalAdmin)],
                            [Privilege::Delete, Privilege::Update],
                        )],
                        ..PolicyRules::default()
                    },
                ),
                None,
            )
            .unwrap();

        let space_id = ResourceId::new_v4();
        let space = store
            .insert(
                AuthorizationPolicy::new(space_id, ResourceType::Space)
                    .with_rules(space_rules(space_id)),
                Some(account.id),
            )
            .unwrap();

        let callout = store
            .insert(
                AuthorizationPolicy::new(ResourceId::new_v4(), ResourceType::Callout).with_rules(
                    PolicyRules {
                        credential_rules: vec![CredentialRule::new(
                            "space-members-contribute",
                            [CredentialDefinition::scoped(CredentialType::SpaceMember, space_id)],
                            [Privilege::Contribute],
                        )],
                        ..PolicyRules::default()
                    },
                ),
                Some(space.id),
            )
            .unwrap();

        Self {
            store,
            account,
            space,
            callout,
        }
    }

    pub fn repo(&self) -> Arc<dyn PolicyRepository> {
        self.store.clone()
    }

    pub fn member(&self) -> ActorContext {
        ActorContext::builder()
            .subject_id(uuid::Uuid::new_v4())
            .credential(CredentialDefinition::scoped(CredentialType::SpaceMember, self.space.id))
            .build()
    }

    pub fn admin(&self) -> ActorContext {
        ActorContext::builder()
            .subject_id(uuid::Uuid::new_v4())
            .credential(CredentialDefinition::scoped(CredentialType::SpaceAdmin, self.space.id))
            .build()
    }

    pub fn lead(&self) -> ActorContext {
        ActorContext::builder()
            .subject_id(uuid::Uuid::new_v4())
            .credential(CredentialDefinition::scoped(CredentialType::SpaceLead, self.space.id))
            .build()
    }
}

/// Rule source whose next answer can be replaced by the test.
#[derive(Default)]
pub struct ScriptedRules {
    next: Mutex<Option<PolicyRules>>,
}

impl ScriptedRules {
    pub fn set(&self, rules: PolicyRules) {
        *self.next.lock() = Some(rules);
    }
}

#[async_trait]
impl PolicyRuleSource for ScriptedRules {
    async fn compute_rules(
        &self,
        current: &AuthorizationPolicy,
    ) -> Result<PolicyRules, DomainError> {
        Ok(self
            .next
            .lock()
            .take()
            .unwrap_or_else(|| current.rules.clone()))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RemoteBehavior {
    Allow,
    Deny,
    Hang,
    Unreachable,
}

/// Remote evaluator whose behaviour can be switched mid-test.
pub struct ScriptedRemote {
    behavior: Mutex<RemoteBehavior>,
    pub calls: AtomicUsize,
}

impl ScriptedRemote {
    pub fn new(behavior: RemoteBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, behavior: RemoteBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteEvaluatorClient for ScriptedRemote {
    async fn evaluate(
        &self,
        _request: RemoteEvaluationRequest,
    ) -> Result<RemoteEvaluationResponse, RemoteTransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock();
        match behavior {
            RemoteBehavior::Allow => Ok(RemoteEvaluationResponse::allowed()),
            RemoteBehavior::Deny => Ok(RemoteEvaluationResponse::denied("remote says no")),
            RemoteBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(RemoteEvaluationResponse::allowed())
            }
            RemoteBehavior::Unreachable => Err(RemoteTransportError::Unreachable {
                dependency: Some(authz_engine_sdk::Dependency::Nats),
                message: "connection refused".to_owned(),
            }),
        }
    }
}

pub fn remote_config(fallback: authz_engine::FallbackMode) -> AuthzEngineConfig {
    let mut config = AuthzEngineConfig::default();
    config.remote.enabled = true;
    config.remote.resource_types = vec![ResourceType::Space];
    config.remote.fallback = fallback;
    config
}
