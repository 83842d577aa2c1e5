//! Bounded TTL caches for policy rows and decisions.
//!
//! Both caches sit on a sharded [`DashMap`], so lookups only ever lock one
//! shard. Recency is tracked with a logical clock stored per entry; when
//! the map outgrows its bound the least recently used entries are evicted
//! in one batch.

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use authz_engine_sdk::{
    CredentialKey, Decision, DecisionSource, PolicyId, Privilege, ResourceId,
};
use dashmap::DashMap;
use tokio::time::Instant;

struct Slot<V> {
    value: V,
    expires_at: Instant,
    last_access: AtomicU64,
}

/// Size-bounded map with per-entry expiry and LRU eviction.
pub struct TtlLruCache<K, V> {
    entries: DashMap<K, Slot<V>>,
    max_entries: usize,
    ttl: Duration,
    clock: AtomicU64,
}

impl<K, V> TtlLruCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    #[must_use]
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            ttl,
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Live value for `key`; an expired entry is removed and reported as a miss.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return None,
            Some(slot) if slot.expires_at > now => {
                slot.last_access.store(self.tick(), Ordering::Relaxed);
                return Some(slot.value.clone());
            }
            Some(_) => {}
        }
        self.entries.remove_if(key, |_, slot| slot.expires_at <= now);
        None
    }

    pub fn insert(&self, key: K, value: V) {
        let slot = Slot {
            value,
            expires_at: Instant::now() + self.ttl,
            last_access: AtomicU64::new(self.tick()),
        };
        self.entries.insert(key, slot);
        if self.entries.len() > self.max_entries {
            self.evict();
        }
    }

    fn evict(&self) {
        let now = Instant::now();
        self.entries.retain(|_, slot| slot.expires_at > now);

        let over = self.entries.len().saturating_sub(self.max_entries);
        if over == 0 {
            return;
        }
        // Evict a little extra so a full cache does not rescan on every insert.
        let target = over + (self.max_entries >> 4);
        let mut by_age: Vec<(u64, K)> = self
            .entries
            .iter()
            .map(|e| (e.last_access.load(Ordering::Relaxed), e.key().clone()))
            .collect();
        if target < by_age.len() {
            by_age.select_nth_unstable_by_key(target, |(age, _)| *age);
            by_age.truncate(target);
        }
        for (_, key) in by_age {
            self.entries.remove(&key);
        }
    }

    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Keep only entries for which `keep` returns `true`.
    pub fn retain(&self, mut keep: impl FnMut(&K, &V) -> bool) {
        self.entries.retain(|k, slot| keep(k, &slot.value));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// `(policy id, version)` for every level of an effective policy, owner first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VersionVector(Vec<(PolicyId, u64)>);

impl VersionVector {
    pub fn push(&mut self, policy_id: PolicyId, version: u64) {
        self.0.push((policy_id, version));
    }

    #[must_use]
    pub fn contains_policy(&self, policy_id: PolicyId) -> bool {
        self.0.iter().any(|(id, _)| *id == policy_id)
    }

    #[must_use]
    pub fn version_of(&self, policy_id: PolicyId) -> Option<u64> {
        self.0
            .iter()
            .find(|(id, _)| *id == policy_id)
            .map(|(_, v)| *v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecisionKey {
    pub credentials: CredentialKey,
    pub resource_id: ResourceId,
    pub privilege: Privilege,
    pub versions: VersionVector,
}

/// Decisions keyed by credentials, resource, privilege and policy versions.
///
/// A reset bumps a version, so every decision computed against the old
/// policy stops matching even before [`DecisionCache::invalidate`] runs.
pub struct DecisionCache {
    entries: TtlLruCache<DecisionKey, Decision>,
}

impl DecisionCache {
    #[must_use]
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: TtlLruCache::new(max_entries, ttl),
        }
    }

    /// Return the cached decision for `key` or compute and store it.
    ///
    /// Fallback decisions are returned but never stored.
    ///
    /// # Errors
    ///
    /// Propagates the error of `compute`; nothing is cached in that case.
    pub async fn get_or_compute<F, Fut, E>(&self, key: DecisionKey, compute: F) -> Result<Decision, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Decision, E>>,
    {
        if let Some(hit) = self.entries.get(&key) {
            tracing::debug!(
                resource_id = %key.resource_id,
                privilege = %key.privilege,
                granted = hit.granted,
                "decision cache hit"
            );
            return Ok(hit);
        }

        let decision = compute().await?;
        if decision.source != DecisionSource::LocalFallback {
            self.entries.insert(key, decision.clone());
        }
        Ok(decision)
    }

    /// Drop every decision computed against any version of `policy_id`.
    pub fn invalidate(&self, policy_id: PolicyId) {
        self.entries
            .retain(|key, _| !key.versions.contains_policy(policy_id));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
