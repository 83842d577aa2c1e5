//! Authorization policy owned by a single resource.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use authz_security::ResourceId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::privilege::{Privilege, ResourceType};
use crate::rules::{CredentialRule, PrivilegeRule, VerifiedCredentialRule};

/// Identifier of an [`AuthorizationPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(pub Uuid);

impl PolicyId {
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Structural problem found in a set of policy rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyValidationError {
    #[error("credential rule '{rule}' has no criteria")]
    EmptyCriteria { rule: String },

    #[error("rule '{rule}' grants no privileges")]
    EmptyGrantedPrivileges { rule: String },

    #[error("verified credential rule '{rule}' has an empty credential type")]
    EmptyCredentialType { rule: String },

    #[error("privilege rules form a cycle through '{privilege}'")]
    PrivilegeCycle { privilege: Privilege },
}

/// The rule content of a policy, as produced by a reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRules {
    pub credential_rules: Vec<CredentialRule>,
    pub privilege_rules: Vec<PrivilegeRule>,
    pub verified_credential_rules: Vec<VerifiedCredentialRule>,
    pub anonymous_read_access: bool,
}

impl PolicyRules {
    /// Check the write-time invariants of a rule set.
    ///
    /// # Errors
    ///
    /// Returns the first violation found: an empty credential rule, a
    /// verified credential rule without a type, or a cycle in the
    /// privilege implication graph (self-loops included).
    pub fn validate(&self) -> Result<(), PolicyValidationError> {
        for rule in &self.credential_rules {
            if rule.criteria.is_empty() {
                return Err(PolicyValidationError::EmptyCriteria {
                    rule: rule.name.clone(),
                });
            }
            if rule.granted_privileges.is_empty() {
                return Err(PolicyValidationError::EmptyGrantedPrivileges {
                    rule: rule.name.clone(),
                });
            }
        }
        for rule in &self.verified_credential_rules {
            if rule.credential_type.is_empty() {
                return Err(PolicyValidationError::EmptyCredentialType {
                    rule: rule.name.clone(),
                });
            }
        }
        detect_privilege_cycle(&self.privilege_rules)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn detect_privilege_cycle(rules: &[PrivilegeRule]) -> Result<(), PolicyValidationError> {
    let mut edges: BTreeMap<Privilege, BTreeSet<Privilege>> = BTreeMap::new();
    for rule in rules {
        edges
            .entry(rule.source_privilege)
            .or_default()
            .extend(rule.granted_privileges.iter().copied());
    }

    let mut marks: BTreeMap<Privilege, Mark> = BTreeMap::new();
    for &start in edges.keys() {
        if marks.contains_key(&start) {
            continue;
        }
        // Iterative DFS; the stack holds (node, remaining successors).
        let mut stack: Vec<(Privilege, Vec<Privilege>)> = Vec::new();
        marks.insert(start, Mark::Visiting);
        stack.push((start, successors(&edges, start)));
        while let Some((node, pending)) = stack.last_mut() {
            let node = *node;
            match pending.pop() {
                Some(next) => match marks.get(&next) {
                    Some(Mark::Visiting) => {
                        return Err(PolicyValidationError::PrivilegeCycle { privilege: next });
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(next, Mark::Visiting);
                        stack.push((next, successors(&edges, next)));
                    }
                },
                None => {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}

fn successors(edges: &BTreeMap<Privilege, BTreeSet<Privilege>>, node: Privilege) -> Vec<Privilege> {
    edges
        .get(&node)
        .map(|s| s.iter().copied().collect())
        .unwrap_or_default()
}

/// The set of rules owned by one resource.
///
/// Mutated only through a policy reset; every reset bumps `version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPolicy {
    pub id: PolicyId,
    pub resource_id: ResourceId,
    pub resource_type: ResourceType,
    #[serde(flatten)]
    pub rules: PolicyRules,
    pub version: u64,
}

impl AuthorizationPolicy {
    /// Fresh, empty policy at version 1.
    #[must_use]
    pub fn new(resource_id: ResourceId, resource_type: ResourceType) -> Self {
        Self {
            id: PolicyId::new_v4(),
            resource_id,
            resource_type,
            rules: PolicyRules::default(),
            version: 1,
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: PolicyRules) -> Self {
        self.rules = rules;
        self
    }

    /// See [`PolicyRules::validate`].
    ///
    /// # Errors
    ///
    /// Returns the first rule violation found.
    pub fn validate(&self) -> Result<(), PolicyValidationError> {
        self.rules.validate()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use authz_security::{CredentialDefinition, CredentialType};

    fn rules_with(privilege_rules: Vec<PrivilegeRule>) -> PolicyRules {
        PolicyRules {
            privilege_rules,
            ..PolicyRules::default()
        }
    }

    #[test]
    fn empty_rules_are_valid() {
        assert_eq!(PolicyRules::default().validate(), Ok(()));
    }

    #[test]
    fn acyclic_privilege_chain_is_valid() {
        let rules = rules_with(vec![
            PrivilegeRule::new("update-implies-read", Privilege::Update, [Privilege::Read]),
            PrivilegeRule::new("delete-implies-update", Privilege::Delete, [Privilege::Update]),
            PrivilegeRule::new("read-implies-about", Privilege::Read, [Privilege::ReadAbout]),
        ]);
        assert_eq!(rules.validate(), Ok(()));
    }

    #[test]
    fn self_loop_is_rejected() {
        let rules = rules_with(vec![PrivilegeRule::new(
            "loop",
            Privilege::Read,
            [Privilege::Read],
        )]);
        assert_eq!(
            rules.validate(),
            Err(PolicyValidationError::PrivilegeCycle {
                privilege: Privilege::Read
            })
        );
    }

    #[test]
    fn indirect_cycle_is_rejected() {
        let rules = rules_with(vec![
            PrivilegeRule::new("a", Privilege::Update, [Privilege::Read]),
            PrivilegeRule::new("b", Privilege::Read, [Privilege::Contribute]),
            PrivilegeRule::new("c", Privilege::Contribute, [Privilege::Update]),
        ]);
        assert!(matches!(
            rules.validate(),
            Err(PolicyValidationError::PrivilegeCycle { .. })
        ));
    }

    #[test]
    fn empty_credential_rule_parts_are_rejected() {
        let no_criteria = PolicyRules {
            credential_rules: vec![CredentialRule::new(
                "empty",
                Vec::<CredentialDefinition>::new(),
                [Privilege::Read],
            )],
            ..PolicyRules::default()
        };
        assert_eq!(
            no_criteria.validate(),
            Err(PolicyValidationError::EmptyCriteria {
                rule: "empty".to_owned()
            })
        );

        let no_grants = PolicyRules {
            credential_rules: vec![CredentialRule::new(
                "nothing",
                [CredentialDefinition::global(CredentialType::GlobalAdmin)],
                Vec::<Privilege>::new(),
            )],
            ..PolicyRules::default()
        };
        assert_eq!(
            no_grants.validate(),
            Err(PolicyValidationError::EmptyGrantedPrivileges {
                rule: "nothing".to_owned()
            })
        );
    }

    #[test]
    fn policy_serializes_rules_flat() {
        let policy = AuthorizationPolicy::new(ResourceId::new_v4(), ResourceType::Space).with_rules(
            PolicyRules {
                anonymous_read_access: true,
                ..PolicyRules::default()
            },
        );
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["anonymous_read_access"], serde_json::json!(true));
        assert_eq!(json["resource_type"], serde_json::json!("space"));
        assert_eq!(json["version"], serde_json::json!(1));

        let back: AuthorizationPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, policy);
    }
}
