//! Error types for the authorization engine.

use authz_security::ResourceId;
use thiserror::Error;

use crate::models::DenyReason;
use crate::policy::PolicyId;
use crate::privilege::Privilege;
use crate::remote::{Dependency, ErrorCode};

/// Errors returned by [`crate::AuthzEngineClient`].
///
/// A plain deny is expressed via `Decision.granted == false`. `Forbidden`
/// is reserved for resolutions that could not run over trustworthy data
/// (broken chain, invalid policy) and therefore fail closed.
#[derive(Debug, Clone, Error)]
pub enum AuthzEngineError {
    #[error("'{privilege}' on {resource_id} denied: {reason}")]
    Forbidden {
        privilege: Privilege,
        resource_id: ResourceId,
        policy_id: Option<PolicyId>,
        reason: DenyReason,
    },

    /// Authorization could not be decided right now; the caller may retry.
    #[error("authorization unavailable ({code})")]
    Unavailable {
        code: ErrorCode,
        dependency: Option<Dependency>,
        retry_after_ms: Option<u64>,
    },

    #[error("resource not found: {0}")]
    ResourceNotFound(ResourceId),

    #[error("invalid policy for {resource_id}: {reason}")]
    InvalidPolicy {
        resource_id: ResourceId,
        reason: String,
    },

    /// The policy changed between read and write of a reset.
    #[error("policy of {resource_id} is no longer at version {expected}")]
    VersionConflict { resource_id: ResourceId, expected: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthzEngineError {
    /// Milliseconds after which a retry makes sense, if the error is transient.
    #[must_use]
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::Unavailable { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}
