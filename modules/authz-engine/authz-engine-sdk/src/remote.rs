//! Wire models for the remote evaluation service.

use std::fmt;

use authz_security::{ActorContext, CredentialDefinition, ResourceId, VerifiedCredential};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::privilege::{Privilege, ResourceType};

/// Error codes reported by the remote evaluator or the breaker in front of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    CircuitBreakerOpen,
    DependencyUnavailable,
    NatsUnavailable,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CircuitBreakerOpen => "circuit_breaker_open",
            Self::DependencyUnavailable => "dependency_unavailable",
            Self::NatsUnavailable => "nats_unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infrastructure the remote evaluator depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    Nats,
    Database,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nats => "nats",
            Self::Database => "database",
        })
    }
}

/// What the remote evaluator needs to know about the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSummary {
    pub subject_id: Uuid,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub credentials: Vec<CredentialDefinition>,
    #[serde(default)]
    pub verified_credentials: Vec<VerifiedCredential>,
}

impl From<&ActorContext> for ActorSummary {
    fn from(actor: &ActorContext) -> Self {
        Self {
            subject_id: actor.subject_id(),
            anonymous: actor.is_anonymous(),
            credentials: actor.credentials().iter().cloned().collect(),
            verified_credentials: actor.verified_credentials().iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvaluationRequest {
    pub actor: ActorSummary,
    pub resource_id: ResourceId,
    pub resource_type: ResourceType,
    pub privilege: Privilege,
}

/// Error body attached to a response the evaluator could not answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteErrorBody {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<Dependency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvaluationResponse {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteErrorBody>,
}

impl RemoteEvaluationResponse {
    #[must_use]
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            error: None,
        }
    }

    #[must_use]
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: RemoteErrorBody) -> Self {
        Self {
            allowed: false,
            reason: None,
            error: Some(error),
        }
    }
}
