//! Group Key Cache
//!
//! Maps an exact member set to the group key generated for it. Lookup is by
//! set equality only: a subset or superset never matches, so any change in
//! membership produces a fresh key. Entries leave the cache only through TTL
//! eviction.

use std::collections::BTreeMap;
use std::time::Duration;

use grouper_core::{MemberSet, PeerIdentity, SimTime};
use grouper_crypto::SymmetricKey;

/// One cached group key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKeyEntry<I: PeerIdentity> {
    pub members: MemberSet<I>,
    pub key: SymmetricKey,
    pub created_at: SimTime,
}

impl<I: PeerIdentity> GroupKeyEntry<I> {
    pub fn is_expired(&self, now: SimTime, ttl: Duration) -> bool {
        now.has_expired(self.created_at, ttl)
    }

    /// Conflict rule for two entries with the same members
    ///
    /// The earlier entry wins; equal timestamps fall back to the smaller key
    /// bytes, so the outcome never depends on which side merges first.
    fn wins_over(&self, other: &GroupKeyEntry<I>) -> bool {
        (self.created_at, &self.key) < (other.created_at, &other.key)
    }
}

/// A broker's group keys, keyed by exact member set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKeyCache<I: PeerIdentity> {
    entries: BTreeMap<MemberSet<I>, GroupKeyEntry<I>>,
}

impl<I: PeerIdentity> Default for GroupKeyCache<I> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<I: PeerIdentity> GroupKeyCache<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key cached for exactly `members`
    pub fn find(&self, members: &MemberSet<I>) -> Option<&SymmetricKey> {
        self.entries.get(members).map(|e| &e.key)
    }

    pub fn entry(&self, members: &MemberSet<I>) -> Option<&GroupKeyEntry<I>> {
        self.entries.get(members)
    }

    /// Store a key for `members`, replacing any previous entry
    pub fn insert_or_replace(
        &mut self,
        members: MemberSet<I>,
        key: SymmetricKey,
        created_at: SimTime,
    ) -> Option<GroupKeyEntry<I>> {
        let entry = GroupKeyEntry {
            members: members.clone(),
            key,
            created_at,
        };
        self.entries.insert(members, entry)
    }

    /// Remove every entry for which `created_at + ttl <= now`
    pub fn evict_expired(&mut self, now: SimTime, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now, ttl));
        before - self.entries.len()
    }

    /// Set union of both caches under the conflict rule
    ///
    /// Neither input is modified; the result owns copies of every entry.
    pub fn union(&self, other: &GroupKeyCache<I>) -> GroupKeyCache<I> {
        let mut merged = self.clone();
        for (members, theirs) in &other.entries {
            let adopt = match merged.entries.get(members) {
                Some(ours) => theirs.wins_over(ours),
                None => true,
            };
            if adopt {
                merged.entries.insert(members.clone(), theirs.clone());
            }
        }
        merged
    }

    /// Anti-entropy step between two brokers
    ///
    /// Both caches are evicted first so stale entries cannot travel back
    /// through the union, then both adopt the same unified cache.
    pub fn reconcile(
        &mut self,
        other: &mut GroupKeyCache<I>,
        now: SimTime,
        ttl: Duration,
    ) -> usize {
        self.evict_expired(now, ttl);
        other.evict_expired(now, ttl);

        let unified = self.union(other);
        *other = unified.clone();
        *self = unified;
        self.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupKeyEntry<I>> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grouper_core::HostAddress;
    use grouper_crypto::KEY_SIZE;

    fn set(ids: &[u32]) -> MemberSet<HostAddress> {
        ids.iter().copied().map(HostAddress).collect()
    }

    fn key(byte: u8) -> SymmetricKey {
        SymmetricKey::from_bytes([byte; KEY_SIZE])
    }

    #[test]
    fn test_exact_lookup() {
        let mut cache = GroupKeyCache::new();
        cache.insert_or_replace(set(&[1, 2]), key(1), SimTime::ZERO);

        assert_eq!(cache.find(&set(&[2, 1])), Some(&key(1)));
        assert_eq!(cache.find(&set(&[1])), None);
        assert_eq!(cache.find(&set(&[1, 2, 3])), None);
    }

    #[test]
    fn test_insert_replaces() {
        let mut cache = GroupKeyCache::new();
        cache.insert_or_replace(set(&[1]), key(1), SimTime::ZERO);
        let old = cache.insert_or_replace(set(&[1]), key(2), SimTime::from_secs(1));

        assert_eq!(old.unwrap().key, key(1));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.find(&set(&[1])), Some(&key(2)));
    }

    #[test]
    fn test_eviction_boundary() {
        let mut cache = GroupKeyCache::new();
        cache.insert_or_replace(set(&[1]), key(1), SimTime::ZERO);
        cache.insert_or_replace(set(&[2]), key(2), SimTime::from_secs(5));
        let ttl = Duration::from_secs(10);

        assert_eq!(cache.evict_expired(SimTime::from_secs(9), ttl), 0);
        assert_eq!(cache.evict_expired(SimTime::from_secs(10), ttl), 1);
        assert!(cache.find(&set(&[1])).is_none());
        assert!(cache.find(&set(&[2])).is_some());
    }

    #[test]
    fn test_union_conflict_prefers_earlier() {
        let mut a = GroupKeyCache::new();
        a.insert_or_replace(set(&[1, 2]), key(9), SimTime::from_secs(3));
        let mut b = GroupKeyCache::new();
        b.insert_or_replace(set(&[1, 2]), key(1), SimTime::from_secs(5));
        b.insert_or_replace(set(&[3]), key(3), SimTime::from_secs(5));

        let ab = a.union(&b);
        let ba = b.union(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab.find(&set(&[1, 2])), Some(&key(9)));
        assert_eq!(ab.len(), 2);
    }

    #[test]
    fn test_union_tie_prefers_smaller_key() {
        let mut a = GroupKeyCache::new();
        a.insert_or_replace(set(&[1]), key(7), SimTime::from_secs(3));
        let mut b = GroupKeyCache::new();
        b.insert_or_replace(set(&[1]), key(4), SimTime::from_secs(3));

        assert_eq!(a.union(&b).find(&set(&[1])), Some(&key(4)));
        assert_eq!(b.union(&a).find(&set(&[1])), Some(&key(4)));
    }

    #[test]
    fn test_union_idempotent() {
        let mut x = GroupKeyCache::new();
        x.insert_or_replace(set(&[1]), key(1), SimTime::ZERO);
        x.insert_or_replace(set(&[1, 2]), key(2), SimTime::ZERO);
        let mut y = GroupKeyCache::new();
        y.insert_or_replace(set(&[2]), key(3), SimTime::ZERO);

        assert_eq!(x.union(&x), x);
        let xy = x.union(&y);
        assert_eq!(xy.union(&y), xy);
    }

    #[test]
    fn test_reconcile_evicts_before_union() {
        let ttl = Duration::from_secs(10);
        let mut a = GroupKeyCache::new();
        a.insert_or_replace(set(&[1]), key(1), SimTime::ZERO);
        a.insert_or_replace(set(&[2]), key(2), SimTime::from_secs(15));
        let mut b = GroupKeyCache::new();
        b.insert_or_replace(set(&[3]), key(3), SimTime::from_secs(12));

        let entries = a.reconcile(&mut b, SimTime::from_secs(20), ttl);

        assert_eq!(entries, 2);
        assert_eq!(a, b);
        assert!(a.find(&set(&[1])).is_none());
        assert!(b.find(&set(&[2])).is_some());
        assert!(a.find(&set(&[3])).is_some());
    }
}
