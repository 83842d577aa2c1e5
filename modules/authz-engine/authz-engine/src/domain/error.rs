//! Domain errors for the authorization engine.

use authz_engine_sdk::{
    AuthzEngineError, Dependency, DenyReason, ErrorCode, Privilege, ResourceId, ResourceType,
    deny_codes,
};

/// Internal domain errors.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("no authorization policy for resource {0}")]
    PolicyNotFound(ResourceId),

    #[error("invalid authorization policy for {resource_id}: {reason}")]
    InvalidPolicy {
        resource_id: ResourceId,
        reason: String,
    },

    #[error("resource {resource_id} is a {actual}, not a {expected}")]
    ResourceTypeMismatch {
        resource_id: ResourceId,
        expected: ResourceType,
        actual: ResourceType,
    },

    #[error("containment cycle through resource {0}")]
    ContainmentCycle(ResourceId),

    #[error("resource {resource_id} is nested deeper than {max_depth} levels")]
    MaxDepthExceeded {
        resource_id: ResourceId,
        max_depth: usize,
    },

    #[error("policy of {resource_id} is no longer at version {expected}")]
    VersionConflict { resource_id: ResourceId, expected: u64 },

    #[error("remote evaluator unavailable ({code})")]
    RemoteUnavailable {
        code: ErrorCode,
        dependency: Option<Dependency>,
        retry_after_ms: Option<u64>,
    },

    #[error("policy storage failure: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Deny code for errors caused by bad or missing policy data.
    ///
    /// Such errors fail closed: the check is denied rather than reported as
    /// an outage.
    #[must_use]
    pub fn data_deny_code(&self) -> Option<&'static str> {
        match self {
            Self::PolicyNotFound(_) => Some(deny_codes::RESOURCE_NOT_FOUND),
            Self::InvalidPolicy { .. }
            | Self::ResourceTypeMismatch { .. }
            | Self::ContainmentCycle(_)
            | Self::MaxDepthExceeded { .. } => Some(deny_codes::INVALID_POLICY),
            Self::VersionConflict { .. }
            | Self::RemoteUnavailable { .. }
            | Self::Storage(_)
            | Self::Internal(_) => None,
        }
    }

    /// Convert into a forbidden outcome for `privilege` when the error is a
    /// data error, or into the generic client error otherwise.
    #[must_use]
    pub fn into_evaluation_error(
        self,
        privilege: Privilege,
        resource_id: ResourceId,
    ) -> AuthzEngineError {
        match self.data_deny_code() {
            Some(code) => AuthzEngineError::Forbidden {
                privilege,
                resource_id,
                policy_id: None,
                reason: DenyReason::new(code),
            },
            None => self.into(),
        }
    }
}

impl From<DomainError> for AuthzEngineError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::PolicyNotFound(id) => Self::ResourceNotFound(id),
            DomainError::InvalidPolicy { resource_id, reason } => {
                Self::InvalidPolicy { resource_id, reason }
            }
            e @ (DomainError::ResourceTypeMismatch { resource_id, .. }
            | DomainError::MaxDepthExceeded { resource_id, .. }
            | DomainError::ContainmentCycle(resource_id)) => Self::InvalidPolicy {
                resource_id,
                reason: e.to_string(),
            },
            DomainError::VersionConflict {
                resource_id,
                expected,
            } => Self::VersionConflict {
                resource_id,
                expected,
            },
            DomainError::RemoteUnavailable {
                code,
                dependency,
                retry_after_ms,
            } => Self::Unavailable {
                code,
                dependency,
                retry_after_ms,
            },
            DomainError::Storage(_) => Self::Unavailable {
                code: ErrorCode::DependencyUnavailable,
                dependency: Some(Dependency::Database),
                retry_after_ms: None,
            },
            DomainError::Internal(reason) => Self::Internal(reason),
        }
    }
}
