//! Decision models returned by the authorization engine.

use std::fmt;

use authz_security::ResourceId;
use serde::{Deserialize, Serialize};

use crate::policy::PolicyId;
use crate::privilege::{Privilege, ResourceType};

/// Machine-readable deny codes carried in [`DenyReason::error_code`].
pub mod deny_codes {
    /// No rule in the effective policy grants the privilege.
    pub const NO_MATCHING_RULE: &str = "no_matching_rule";
    /// The remote evaluator answered `allowed: false`.
    pub const REMOTE_DENIED: &str = "remote_denied";
    /// A policy in the chain failed validation or did not match its resource.
    pub const INVALID_POLICY: &str = "invalid_policy";
    /// The resource or one of its ancestors has no policy.
    pub const RESOURCE_NOT_FOUND: &str = "resource_not_found";
}

/// The resource a privilege is requested on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: ResourceId,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

impl ResourceRef {
    #[must_use]
    pub fn new(id: ResourceId, resource_type: ResourceType) -> Self {
        Self { id, resource_type }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

/// Kind of rule that produced a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    Credential,
    VerifiedCredential,
    Privilege,
    AnonymousRead,
}

/// Points at the rule that first contributed the requested privilege.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRef {
    pub policy_id: PolicyId,
    pub kind: RuleKind,
    /// Position of the rule in its policy's list of that kind.
    pub index: usize,
    pub name: String,
}

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionSource {
    Local,
    Remote,
    /// Resolved locally because the remote evaluator was unavailable.
    LocalFallback,
    /// Enforcement is switched off in configuration.
    EnforcementDisabled,
}

/// Reason for a deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyReason {
    /// Machine-readable error code, see [`deny_codes`].
    pub error_code: String,
    /// Human-readable details (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl DenyReason {
    #[must_use]
    pub fn new(error_code: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {details}", self.error_code),
            None => f.write_str(&self.error_code),
        }
    }
}

/// Outcome of evaluating one privilege on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub granted: bool,
    pub privilege: Privilege,
    /// Policy of the resource the decision was made for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<PolicyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<RuleRef>,
    pub source: DecisionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_reason: Option<DenyReason>,
}

impl Decision {
    #[must_use]
    pub fn allow(privilege: Privilege, source: DecisionSource) -> Self {
        Self {
            granted: true,
            privilege,
            policy_id: None,
            matched_rule: None,
            source,
            deny_reason: None,
        }
    }

    #[must_use]
    pub fn deny(privilege: Privilege, source: DecisionSource, reason: DenyReason) -> Self {
        Self {
            granted: false,
            privilege,
            policy_id: None,
            matched_rule: None,
            source,
            deny_reason: Some(reason),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy_id: PolicyId) -> Self {
        self.policy_id = Some(policy_id);
        self
    }

    #[must_use]
    pub fn with_matched_rule(mut self, rule: RuleRef) -> Self {
        self.matched_rule = Some(rule);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: DecisionSource) -> Self {
        self.source = source;
        self
    }
}
