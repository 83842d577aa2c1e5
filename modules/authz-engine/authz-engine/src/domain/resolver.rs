//! Local privilege resolution over an [`EffectivePolicy`].
//!
//! Resolution is purely additive: rules only ever grant, so holding more
//! credentials can never remove a privilege.

use std::collections::{BTreeMap, BTreeSet};

use authz_engine_sdk::{
    ActorContext, Decision, DecisionSource, DenyReason, Privilege, RuleKind, RuleRef, deny_codes,
};

use super::aggregator::EffectivePolicy;

const ANONYMOUS_READ_RULE: &str = "anonymous-read-access";

/// Every privilege the actor holds, each with the first rule that granted it.
#[must_use]
pub fn accumulate(actor: &ActorContext, effective: &EffectivePolicy) -> BTreeMap<Privilege, RuleRef> {
    let mut granted: BTreeMap<Privilege, RuleRef> = BTreeMap::new();

    if let Some(policy_id) = effective.anonymous_read_policy() {
        granted.insert(
            Privilege::Read,
            RuleRef {
                policy_id,
                kind: RuleKind::AnonymousRead,
                index: 0,
                name: ANONYMOUS_READ_RULE.to_owned(),
            },
        );
    }

    for (policy_id, index, rule) in effective.credential_rules() {
        if !rule.matches(actor) {
            continue;
        }
        for privilege in &rule.granted_privileges {
            granted.entry(*privilege).or_insert_with(|| RuleRef {
                policy_id,
                kind: RuleKind::Credential,
                index,
                name: rule.name.clone(),
            });
        }
    }

    for (policy_id, index, rule) in effective.verified_credential_rules() {
        if !rule.matches(actor) {
            continue;
        }
        for privilege in &rule.granted_privileges {
            granted.entry(*privilege).or_insert_with(|| RuleRef {
                policy_id,
                kind: RuleKind::VerifiedCredential,
                index,
                name: rule.name.clone(),
            });
        }
    }

    // Fixed point over implications; each pass either adds a privilege or stops.
    let implications: Vec<_> = effective.privilege_rules().collect();
    for _ in 0..=implications.len() {
        let mut changed = false;
        for (policy_id, index, rule) in &implications {
            if !granted.contains_key(&rule.source_privilege) {
                continue;
            }
            for privilege in &rule.granted_privileges {
                if granted.contains_key(privilege) {
                    continue;
                }
                granted.insert(
                    *privilege,
                    RuleRef {
                        policy_id: *policy_id,
                        kind: RuleKind::Privilege,
                        index: *index,
                        name: rule.name.clone(),
                    },
                );
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    granted
}

/// Decide whether `actor` holds `requested` under `effective`.
#[must_use]
pub fn resolve(actor: &ActorContext, effective: &EffectivePolicy, requested: Privilege) -> Decision {
    let owner = effective.owner().id;

    if requested == Privilege::Read
        && let Some(policy_id) = effective.anonymous_read_policy()
    {
        return Decision::allow(requested, DecisionSource::Local)
            .with_policy(owner)
            .with_matched_rule(RuleRef {
                policy_id,
                kind: RuleKind::AnonymousRead,
                index: 0,
                name: ANONYMOUS_READ_RULE.to_owned(),
            });
    }

    match accumulate(actor, effective).remove(&requested) {
        Some(rule) => Decision::allow(requested, DecisionSource::Local)
            .with_policy(owner)
            .with_matched_rule(rule),
        None => Decision::deny(
            requested,
            DecisionSource::Local,
            DenyReason::new(deny_codes::NO_MATCHING_RULE)
                .with_details(format!("no rule grants '{requested}'")),
        )
        .with_policy(owner),
    }
}

/// The "my privileges" view of [`accumulate`].
#[must_use]
pub fn granted_privileges(actor: &ActorContext, effective: &EffectivePolicy) -> BTreeSet<Privilege> {
    accumulate(actor, effective).into_keys().collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use authz_engine_sdk::{
        AuthorizationPolicy, CredentialDefinition, CredentialRule, CredentialType, PolicyRules,
        PrivilegeRule, ResourceId, ResourceRef, ResourceType, VerifiedCredential,
        VerifiedCredentialRule,
    };

    use super::*;

    fn space_id() -> ResourceId {
        "5a0e8400-e29b-41d4-a716-446655440001".parse().unwrap()
    }

    fn effective(rules: PolicyRules) -> EffectivePolicy {
        let policy = AuthorizationPolicy::new(space_id(), ResourceType::Space).with_rules(rules);
        EffectivePolicy::new(
            ResourceRef::new(space_id(), ResourceType::Space),
            Arc::new(policy),
            Vec::new(),
        )
    }

    fn member_reads() -> CredentialRule {
        CredentialRule::new(
            "members-read",
            [CredentialDefinition::global(CredentialType::SpaceMember)],
            [Privilege::Read],
        )
    }

    fn member_of_space() -> ActorContext {
        ActorContext::builder()
            .credential(CredentialDefinition::scoped(CredentialType::SpaceMember, space_id()))
            .build()
    }

    #[test]
    fn member_with_any_resource_rule_reads_but_cannot_update() {
        let eff = effective(PolicyRules {
            credential_rules: vec![member_reads()],
            ..PolicyRules::default()
        });
        let actor = member_of_space();

        let read = resolve(&actor, &eff, Privilege::Read);
        assert!(read.granted);
        let rule = read.matched_rule.unwrap();
        assert_eq!(rule.kind, RuleKind::Credential);
        assert_eq!(rule.name, "members-read");
        assert_eq!(rule.index, 0);

        let update = resolve(&actor, &eff, Privilege::Update);
        assert!(!update.granted);
        assert_eq!(
            update.deny_reason.unwrap().error_code,
            deny_codes::NO_MATCHING_RULE
        );
        assert_eq!(update.policy_id, Some(eff.owner().id));
    }

    #[test]
    fn privilege_rule_implies_read_from_update() {
        let eff = effective(PolicyRules {
            credential_rules: vec![CredentialRule::new(
                "admins-update",
                [CredentialDefinition::global(CredentialType::SpaceAdmin)],
                [Privilege::Update],
            )],
            privilege_rules: vec![PrivilegeRule::new(
                "update-implies-read",
                Privilege::Update,
                [Privilege::Read],
            )],
            ..PolicyRules::default()
        });
        let actor = ActorContext::builder()
            .credential(CredentialDefinition::scoped(CredentialType::SpaceAdmin, space_id()))
            .build();

        let read = resolve(&actor, &eff, Privilege::Read);
        assert!(read.granted);
        assert_eq!(read.matched_rule.unwrap().kind, RuleKind::Privilege);
    }

    #[test]
    fn implication_chains_reach_fixed_point() {
        let eff = effective(PolicyRules {
            credential_rules: vec![CredentialRule::new(
                "admins",
                [CredentialDefinition::global(CredentialType::SpaceAdmin)],
                [Privilege::Delete],
            )],
            // Listed in reverse so a single pass is not enough.
            privilege_rules: vec![
                PrivilegeRule::new("read-about", Privilege::Read, [Privilege::ReadAbout]),
                PrivilegeRule::new("update-read", Privilege::Update, [Privilege::Read]),
                PrivilegeRule::new("delete-update", Privilege::Delete, [Privilege::Update]),
            ],
            ..PolicyRules::default()
        });
        let actor = ActorContext::builder()
            .credential(CredentialDefinition::global(CredentialType::SpaceAdmin))
            .build();

        let granted = granted_privileges(&actor, &eff);
        assert_eq!(
            granted,
            BTreeSet::from([
                Privilege::Delete,
                Privilege::Update,
                Privilege::Read,
                Privilege::ReadAbout
            ])
        );
    }

    #[test]
    fn anonymous_read_short_circuits() {
        let eff = effective(PolicyRules {
            anonymous_read_access: true,
            ..PolicyRules::default()
        });

        let decision = resolve(&ActorContext::anonymous(), &eff, Privilege::Read);
        assert!(decision.granted);
        assert_eq!(decision.matched_rule.unwrap().kind, RuleKind::AnonymousRead);

        let update = resolve(&ActorContext::anonymous(), &eff, Privilege::Update);
        assert!(!update.granted);
    }

    #[test]
    fn verified_credential_rule_grants() {
        let eff = effective(PolicyRules {
            verified_credential_rules: vec![
                VerifiedCredentialRule::new("campaign", "vc-campaign", [Privilege::CommunityJoin])
                    .with_issuer("did:example:alkemio"),
            ],
            ..PolicyRules::default()
        });
        let actor = ActorContext::builder()
            .verified_credential(VerifiedCredential::new("vc-campaign", "did:example:alkemio"))
            .build();

        let decision = resolve(&actor, &eff, Privilege::CommunityJoin);
        assert!(decision.granted);
        assert_eq!(
            decision.matched_rule.unwrap().kind,
            RuleKind::VerifiedCredential
        );
    }

    #[test]
    fn ancestors_only_add_privileges() {
        let space = Arc::new(
            AuthorizationPolicy::new(space_id(), ResourceType::Space).with_rules(PolicyRules {
                credential_rules: vec![
                    member_reads(),
                    CredentialRule::new(
                        "members-contribute-here",
                        [CredentialDefinition::global(CredentialType::SpaceMember)],
                        [Privilege::Contribute],
                    )
                    .non_cascading(),
                ],
                privilege_rules: vec![PrivilegeRule::new(
                    "read-implies-about",
                    Privilege::Read,
                    [Privilege::ReadAbout],
                )],
                ..PolicyRules::default()
            }),
        );
        let callout_id = ResourceId::new_v4();
        let callout = Arc::new(
            AuthorizationPolicy::new(callout_id, ResourceType::Callout).with_rules(PolicyRules {
                credential_rules: vec![CredentialRule::new(
                    "members-update",
                    [CredentialDefinition::global(CredentialType::SpaceMember)],
                    [Privilege::Update],
                )],
                ..PolicyRules::default()
            }),
        );
        let resource = ResourceRef::new(callout_id, ResourceType::Callout);
        let own_only = EffectivePolicy::new(resource, Arc::clone(&callout), Vec::new());
        let inherited = EffectivePolicy::new(resource, callout, vec![space]);

        for actor in [member_of_space(), ActorContext::anonymous()] {
            let own = granted_privileges(&actor, &own_only);
            let all = granted_privileges(&actor, &inherited);
            assert!(all.is_superset(&own));
        }

        let all = granted_privileges(&member_of_space(), &inherited);
        assert!(all.contains(&Privilege::ReadAbout));
        assert!(!all.contains(&Privilege::Contribute));
    }

    #[test]
    fn resolution_is_deterministic_and_monotonic() {
        let eff = effective(PolicyRules {
            credential_rules: vec![
                member_reads(),
                CredentialRule::new(
                    "leads-contribute",
                    [CredentialDefinition::scoped(CredentialType::SpaceLead, space_id())],
                    [Privilege::Contribute],
                ),
            ],
            ..PolicyRules::default()
        });
        let member = member_of_space();
        let lead_and_member = ActorContext::builder()
            .credential(CredentialDefinition::scoped(CredentialType::SpaceMember, space_id()))
            .credential(CredentialDefinition::scoped(CredentialType::SpaceLead, space_id()))
            .build();

        for privilege in Privilege::ALL {
            let first = resolve(&member, &eff, *privilege);
            let second = resolve(&member, &eff, *privilege);
            assert_eq!(first, second);
        }

        let base = granted_privileges(&member, &eff);
        let more = granted_privileges(&lead_and_member, &eff);
        assert!(more.is_superset(&base));
        assert!(more.contains(&Privilege::Contribute));
    }
}
