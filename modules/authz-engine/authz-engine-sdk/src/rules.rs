//! Rule model: the three kinds of rule an authorization policy carries.

use std::collections::BTreeSet;

use authz_security::{ActorContext, CredentialDefinition, VerifiedCredential};
use serde::{Deserialize, Serialize};

use crate::privilege::Privilege;

fn default_cascade() -> bool {
    true
}

/// Grants privileges to actors holding any of the listed credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRule {
    pub name: String,
    /// Patterns; the rule matches when at least one of them matches a held credential.
    pub criteria: Vec<CredentialDefinition>,
    pub granted_privileges: BTreeSet<Privilege>,
    /// Whether descendants of the owning resource inherit this rule.
    #[serde(default = "default_cascade")]
    pub cascade: bool,
}

impl CredentialRule {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        criteria: impl IntoIterator<Item = CredentialDefinition>,
        granted_privileges: impl IntoIterator<Item = Privilege>,
    ) -> Self {
        Self {
            name: name.into(),
            criteria: criteria.into_iter().collect(),
            granted_privileges: granted_privileges.into_iter().collect(),
            cascade: true,
        }
    }

    /// Restrict the rule to the resource that owns it.
    #[must_use]
    pub fn non_cascading(mut self) -> Self {
        self.cascade = false;
        self
    }

    #[must_use]
    pub fn matches(&self, actor: &ActorContext) -> bool {
        self.criteria
            .iter()
            .any(|c| actor.credentials().iter().any(|held| c.matches(held)))
    }
}

/// Holding `source_privilege` implies every privilege in `granted_privileges`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeRule {
    pub name: String,
    pub source_privilege: Privilege,
    pub granted_privileges: BTreeSet<Privilege>,
}

impl PrivilegeRule {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        source_privilege: Privilege,
        granted_privileges: impl IntoIterator<Item = Privilege>,
    ) -> Self {
        Self {
            name: name.into(),
            source_privilege,
            granted_privileges: granted_privileges.into_iter().collect(),
        }
    }
}

/// `name = value` requirement on a verified credential claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimConstraint {
    pub name: String,
    pub value: String,
}

/// Grants privileges to actors presenting a matching externally verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedCredentialRule {
    pub name: String,
    pub credential_type: String,
    /// `None` accepts any issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub claims: Vec<ClaimConstraint>,
    pub granted_privileges: BTreeSet<Privilege>,
}

impl VerifiedCredentialRule {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        credential_type: impl Into<String>,
        granted_privileges: impl IntoIterator<Item = Privilege>,
    ) -> Self {
        Self {
            name: name.into(),
            credential_type: credential_type.into(),
            issuer: None,
            claims: Vec::new(),
            granted_privileges: granted_privileges.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push(ClaimConstraint {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn matches_credential(&self, credential: &VerifiedCredential) -> bool {
        credential.credential_type == self.credential_type
            && self
                .issuer
                .as_deref()
                .is_none_or(|issuer| credential.issuer == issuer)
            && self
                .claims
                .iter()
                .all(|c| credential.claim(&c.name) == Some(c.value.as_str()))
    }

    #[must_use]
    pub fn matches(&self, actor: &ActorContext) -> bool {
        actor
            .verified_credentials()
            .iter()
            .any(|vc| self.matches_credential(vc))
    }
}
