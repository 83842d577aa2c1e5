use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use authz_engine_sdk::{AuthorizationPolicy, PolicyRules, ResourceId, ResourceRef, ResourceType};
use parking_lot::RwLock;

use crate::domain::error::DomainError;
use crate::domain::repo::PolicyRepository;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("resource {0} is already stored")]
    DuplicateResource(ResourceId),

    #[error("unknown resource {0}")]
    UnknownResource(ResourceId),
}

#[derive(Debug, Clone)]
struct Node {
    resource_type: ResourceType,
    parent_id: Option<ResourceId>,
    policy: Option<AuthorizationPolicy>,
}

/// Containment tree and policies held in memory.
///
/// Resources are arena entries keyed by id with an explicit `parent_id`;
/// the store does not validate policies, so broken data can be seeded.
#[derive(Default)]
pub struct InMemoryPolicyStore {
    nodes: RwLock<HashMap<ResourceId, Node>>,
}

impl InMemoryPolicyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `policy` for its resource under `parent_id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateResource`] if the resource exists,
    /// [`StoreError::UnknownResource`] if the parent does not.
    pub fn insert(
        &self,
        policy: AuthorizationPolicy,
        parent_id: Option<ResourceId>,
    ) -> Result<ResourceRef, StoreError> {
        let resource = ResourceRef::new(policy.resource_id, policy.resource_type);
        self.insert_node(resource, parent_id, Some(policy))?;
        Ok(resource)
    }

    /// Add a resource that has no policy row.
    ///
    /// # Errors
    ///
    /// Same as [`InMemoryPolicyStore::insert`].
    pub fn insert_without_policy(
        &self,
        resource: ResourceRef,
        parent_id: Option<ResourceId>,
    ) -> Result<(), StoreError> {
        self.insert_node(resource, parent_id, None)
    }

    fn insert_node(
        &self,
        resource: ResourceRef,
        parent_id: Option<ResourceId>,
        policy: Option<AuthorizationPolicy>,
    ) -> Result<(), StoreError> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&resource.id) {
            return Err(StoreError::DuplicateResource(resource.id));
        }
        if let Some(parent) = parent_id
            && !nodes.contains_key(&parent)
        {
            return Err(StoreError::UnknownResource(parent));
        }
        nodes.insert(
            resource.id,
            Node {
                resource_type: resource.resource_type,
                parent_id,
                policy,
            },
        );
        Ok(())
    }

    /// Move a resource under another parent. No cycle check is made.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownResource`] if either resource is missing.
    pub fn set_parent(
        &self,
        resource_id: ResourceId,
        parent_id: Option<ResourceId>,
    ) -> Result<(), StoreError> {
        let mut nodes = self.nodes.write();
        if let Some(parent) = parent_id
            && !nodes.contains_key(&parent)
        {
            return Err(StoreError::UnknownResource(parent));
        }
        let node = nodes
            .get_mut(&resource_id)
            .ok_or(StoreError::UnknownResource(resource_id))?;
        node.parent_id = parent_id;
        Ok(())
    }

    #[must_use]
    pub fn resource(&self, resource_id: ResourceId) -> Option<ResourceRef> {
        self.nodes
            .read()
            .get(&resource_id)
            .map(|n| ResourceRef::new(resource_id, n.resource_type))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyStore {
    async fn load_policy(
        &self,
        resource_id: ResourceId,
    ) -> Result<Option<AuthorizationPolicy>, DomainError> {
        Ok(self
            .nodes
            .read()
            .get(&resource_id)
            .and_then(|n| n.policy.clone()))
    }

    async fn load_ancestor_chain(
        &self,
        resource_id: ResourceId,
        limit: usize,
    ) -> Result<Vec<ResourceId>, DomainError> {
        let nodes = self.nodes.read();
        let mut chain = Vec::new();
        let mut seen = HashSet::from([resource_id]);
        let mut current = nodes.get(&resource_id).and_then(|n| n.parent_id);

        while let Some(id) = current {
            if chain.len() == limit {
                break;
            }
            chain.push(id);
            if !seen.insert(id) {
                break;
            }
            current = nodes.get(&id).and_then(|n| n.parent_id);
        }
        Ok(chain)
    }

    async fn store_rules(
        &self,
        resource_id: ResourceId,
        expected_version: u64,
        rules: PolicyRules,
    ) -> Result<AuthorizationPolicy, DomainError> {
        let mut nodes = self.nodes.write();
        let policy = nodes
            .get_mut(&resource_id)
            .and_then(|n| n.policy.as_mut())
            .ok_or(DomainError::PolicyNotFound(resource_id))?;

        if policy.version != expected_version {
            return Err(DomainError::VersionConflict {
                resource_id,
                expected: expected_version,
            });
        }
        policy.rules = rules;
        policy.version += 1;
        Ok(policy.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn policy(resource_type: ResourceType) -> AuthorizationPolicy {
        AuthorizationPolicy::new(ResourceId::new_v4(), resource_type)
    }

    #[tokio::test]
    async fn ancestor_chain_is_parent_first() {
        let store = InMemoryPolicyStore::new();
        let account = store.insert(policy(ResourceType::Account), None).unwrap();
        let space = store
            .insert(policy(ResourceType::Space), Some(account.id))
            .unwrap();
        let callout = store
            .insert(policy(ResourceType::Callout), Some(space.id))
            .unwrap();

        let chain = store.load_ancestor_chain(callout.id, 8).await.unwrap();
        assert_eq!(chain, vec![space.id, account.id]);
        assert!(store.load_ancestor_chain(account.id, 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cycle_stops_the_walk_at_the_repeated_id() {
        let store = InMemoryPolicyStore::new();
        let a = store.insert(policy(ResourceType::Space), None).unwrap();
        let b = store.insert(policy(ResourceType::Space), Some(a.id)).unwrap();
        store.set_parent(a.id, Some(b.id)).unwrap();

        let chain = store.load_ancestor_chain(b.id, 8).await.unwrap();
        assert_eq!(chain, vec![a.id, b.id]);
    }

    #[tokio::test]
    async fn walk_stops_at_the_limit() {
        let store = InMemoryPolicyStore::new();
        let mut parent = store.insert(policy(ResourceType::Account), None).unwrap();
        let mut ids = Vec::new();
        for _ in 0..64 {
            parent = store
                .insert(policy(ResourceType::Subspace), Some(parent.id))
                .unwrap();
            ids.push(parent.id);
        }
        let leaf = ids.pop().unwrap();

        let chain = store.load_ancestor_chain(leaf, 4).await.unwrap();
        ids.reverse();
        assert_eq!(chain, ids[..4].to_vec());
    }

    #[tokio::test]
    async fn store_rules_checks_version() {
        let store = InMemoryPolicyStore::new();
        let space = store.insert(policy(ResourceType::Space), None).unwrap();

        let stored = store
            .store_rules(space.id, 1, PolicyRules::default())
            .await
            .unwrap();
        assert_eq!(stored.version, 2);

        let err = store
            .store_rules(space.id, 1, PolicyRules::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::VersionConflict { expected: 1, .. }));
    }

    #[test]
    fn rejects_unknown_parent_and_duplicates() {
        let store = InMemoryPolicyStore::new();
        let p = policy(ResourceType::Space);
        let missing = ResourceId::new_v4();
        assert_eq!(
            store.insert(p.clone(), Some(missing)).unwrap_err(),
            StoreError::UnknownResource(missing)
        );
        store.insert(p.clone(), None).unwrap();
        assert_eq!(
            store.insert(p.clone(), None).unwrap_err(),
            StoreError::DuplicateResource(p.resource_id)
        );
        assert_eq!(store.len(), 1);
    }
}
