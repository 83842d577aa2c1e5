//! Credential vocabulary shared by the actor context and the rule model.
//!
//! Callers map their richer domain roles onto [`CredentialType`] at the edge;
//! inside the engine the set is closed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a resource in the containment tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub Uuid);

impl ResourceId {
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for ResourceId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ResourceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Unknown name passed to one of the closed-vocabulary parsers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown credential type '{0}'")]
pub struct UnknownCredentialType(pub String);

/// Type of a locally issued credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialType {
    GlobalAdmin,
    GlobalSupport,
    GlobalLicenseManager,
    GlobalCommunityRead,
    GlobalSpacesReader,
    GlobalRegistered,
    GlobalAnonymous,
    GlobalGuest,
    AccountAdmin,
    AccountHost,
    SpaceAdmin,
    SpaceMember,
    SpaceLead,
    SpaceSubspaceAdmin,
    SpaceMemberInvitee,
    OrganizationAdmin,
    OrganizationOwner,
    OrganizationAssociate,
    UserSelfManagement,
    UserGroupMember,
    BetaTester,
    VcCampaign,
    InnovationPackProvider,
}

impl CredentialType {
    pub const ALL: &'static [Self] = &[
        Self::GlobalAdmin,
        Self::GlobalSupport,
        Self::GlobalLicenseManager,
        Self::GlobalCommunityRead,
        Self::GlobalSpacesReader,
        Self::GlobalRegistered,
        Self::GlobalAnonymous,
        Self::GlobalGuest,
        Self::AccountAdmin,
        Self::AccountHost,
        Self::SpaceAdmin,
        Self::SpaceMember,
        Self::SpaceLead,
        Self::SpaceSubspaceAdmin,
        Self::SpaceMemberInvitee,
        Self::OrganizationAdmin,
        Self::OrganizationOwner,
        Self::OrganizationAssociate,
        Self::UserSelfManagement,
        Self::UserGroupMember,
        Self::BetaTester,
        Self::VcCampaign,
        Self::InnovationPackProvider,
    ];

    /// Wire name of the credential type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GlobalAdmin => "global-admin",
            Self::GlobalSupport => "global-support",
            Self::GlobalLicenseManager => "global-license-manager",
            Self::GlobalCommunityRead => "global-community-read",
            Self::GlobalSpacesReader => "global-spaces-reader",
            Self::GlobalRegistered => "global-registered",
            Self::GlobalAnonymous => "global-anonymous",
            Self::GlobalGuest => "global-guest",
            Self::AccountAdmin => "account-admin",
            Self::AccountHost => "account-host",
            Self::SpaceAdmin => "space-admin",
            Self::SpaceMember => "space-member",
            Self::SpaceLead => "space-lead",
            Self::SpaceSubspaceAdmin => "space-subspace-admin",
            Self::SpaceMemberInvitee => "space-member-invitee",
            Self::OrganizationAdmin => "organization-admin",
            Self::OrganizationOwner => "organization-owner",
            Self::OrganizationAssociate => "organization-associate",
            Self::UserSelfManagement => "user-self-management",
            Self::UserGroupMember => "user-group-member",
            Self::BetaTester => "beta-tester",
            Self::VcCampaign => "vc-campaign",
            Self::InnovationPackProvider => "innovation-pack-provider",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialType {
    type Err = UnknownCredentialType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownCredentialType(s.to_owned()))
    }
}

/// A credential an actor holds, or a credential pattern inside a rule.
///
/// `resource_id == None` means "any resource" when used as a pattern and a
/// global (unscoped) grant when held by an actor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CredentialDefinition {
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<ResourceId>,
}

impl CredentialDefinition {
    #[must_use]
    pub fn new(credential_type: CredentialType, resource_id: Option<ResourceId>) -> Self {
        Self {
            credential_type,
            resource_id,
        }
    }

    /// Unscoped credential of the given type.
    #[must_use]
    pub fn global(credential_type: CredentialType) -> Self {
        Self::new(credential_type, None)
    }

    /// Credential scoped to one resource.
    #[must_use]
    pub fn scoped(credential_type: CredentialType, resource_id: ResourceId) -> Self {
        Self::new(credential_type, Some(resource_id))
    }

    /// Whether `self`, used as a rule pattern, matches a held credential.
    #[must_use]
    pub fn matches(&self, held: &CredentialDefinition) -> bool {
        self.credential_type == held.credential_type
            && self
                .resource_id
                .is_none_or(|wanted| held.resource_id == Some(wanted))
    }
}

impl fmt::Display for CredentialDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resource_id {
            Some(id) => write!(f, "{}:{id}", self.credential_type),
            None => write!(f, "{}", self.credential_type),
        }
    }
}

/// Malformed `type[:resource-id]` credential string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialParseError {
    #[error(transparent)]
    UnknownType(#[from] UnknownCredentialType),
    #[error("invalid resource id '{0}'")]
    InvalidResourceId(String),
}

impl FromStr for CredentialDefinition {
    type Err = CredentialParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (type_part, resource_part) = match s.split_once(':') {
            Some((t, r)) => (t, Some(r)),
            None => (s, None),
        };
        let credential_type = type_part.trim().parse::<CredentialType>()?;
        let resource_id = match resource_part.map(str::trim) {
            None | Some("") => None,
            Some(r) => Some(
                r.parse::<ResourceId>()
                    .map_err(|_| CredentialParseError::InvalidResourceId(r.to_owned()))?,
            ),
        };
        Ok(Self::new(credential_type, resource_id))
    }
}

/// A credential asserted by an external, verifiable issuer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VerifiedCredential {
    #[serde(rename = "type")]
    pub credential_type: String,
    pub issuer: String,
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
}

impl VerifiedCredential {
    #[must_use]
    pub fn new(credential_type: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            credential_type: credential_type.into(),
            issuer: issuer.into(),
            claims: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&str> {
        self.claims.get(name).map(String::as_str)
    }
}
