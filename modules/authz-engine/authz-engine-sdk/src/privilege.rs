//! Closed vocabularies for privileges and resource types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unknown name passed to [`Privilege::from_str`] or [`ResourceType::from_str`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

/// An atomic permitted action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Privilege {
    Create,
    Read,
    Update,
    Delete,
    Grant,
    Contribute,
    ReadAbout,
    AuthorizationReset,
    PlatformAdmin,
    CreateSpace,
    CreateSubspace,
    CreateOrganization,
    CommunityJoin,
    CommunityApply,
    CommunityInvite,
    CommunityAddMember,
    ReceiveNotifications,
    FileUpload,
    PublicShare,
    TransferResourceOffer,
    TransferResourceAccept,
    ReadUsers,
    ReadUserPii,
}

impl Privilege {
    pub const ALL: &'static [Self] = &[
        Self::Create,
        Self::Read,
        Self::Update,
        Self::Delete,
        Self::Grant,
        Self::Contribute,
        Self::ReadAbout,
        Self::AuthorizationReset,
        Self::PlatformAdmin,
        Self::CreateSpace,
        Self::CreateSubspace,
        Self::CreateOrganization,
        Self::CommunityJoin,
        Self::CommunityApply,
        Self::CommunityInvite,
        Self::CommunityAddMember,
        Self::ReceiveNotifications,
        Self::FileUpload,
        Self::PublicShare,
        Self::TransferResourceOffer,
        Self::TransferResourceAccept,
        Self::ReadUsers,
        Self::ReadUserPii,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Grant => "grant",
            Self::Contribute => "contribute",
            Self::ReadAbout => "read-about",
            Self::AuthorizationReset => "authorization-reset",
            Self::PlatformAdmin => "platform-admin",
            Self::CreateSpace => "create-space",
            Self::CreateSubspace => "create-subspace",
            Self::CreateOrganization => "create-organization",
            Self::CommunityJoin => "community-join",
            Self::CommunityApply => "community-apply",
            Self::CommunityInvite => "community-invite",
            Self::CommunityAddMember => "community-add-member",
            Self::ReceiveNotifications => "receive-notifications",
            Self::FileUpload => "file-upload",
            Self::PublicShare => "public-share",
            Self::TransferResourceOffer => "transfer-resource-offer",
            Self::TransferResourceAccept => "transfer-resource-accept",
            Self::ReadUsers => "read-users",
            Self::ReadUserPii => "read-user-pii",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "privilege",
                value: s.to_owned(),
            })
    }
}

/// Kind of domain entity owning an authorization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Platform,
    Account,
    Space,
    Subspace,
    SubSubspace,
    Organization,
    User,
    Community,
    Collaboration,
    Callout,
}

impl ResourceType {
    pub const ALL: &'static [Self] = &[
        Self::Platform,
        Self::Account,
        Self::Space,
        Self::Subspace,
        Self::SubSubspace,
        Self::Organization,
        Self::User,
        Self::Community,
        Self::Collaboration,
        Self::Callout,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Account => "account",
            Self::Space => "space",
            Self::Subspace => "subspace",
            Self::SubSubspace => "sub_subspace",
            Self::Organization => "organization",
            Self::User => "user",
            Self::Community => "community",
            Self::Collaboration => "collaboration",
            Self::Callout => "callout",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownName {
                kind: "resource type",
                value: s.to_owned(),
            })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn privilege_wire_names_match_serde() {
        for p in Privilege::ALL {
            let json = serde_json::to_value(p).unwrap();
            assert_eq!(json, serde_json::Value::String(p.as_str().to_owned()));
            assert_eq!(p.as_str().parse::<Privilege>().unwrap(), *p);
        }
    }

    #[test]
    fn resource_type_wire_names_match_serde() {
        for t in ResourceType::ALL {
            let json = serde_json::to_value(t).unwrap();
            assert_eq!(json, serde_json::Value::String(t.as_str().to_owned()));
            assert_eq!(t.as_str().parse::<ResourceType>().unwrap(), *t);
        }
    }

    #[test]
    fn unknown_privilege_is_rejected() {
        let err = "whiteboard-multi-user".parse::<Privilege>().unwrap_err();
        assert_eq!(err.kind, "privilege");
        assert_eq!(err.value, "whiteboard-multi-user");
    }
}
