//! Pairwise keys shared between a broker and one publisher or subscriber

use std::collections::BTreeMap;
use std::time::Duration;

use grouper_core::{PeerIdentity, SimTime};

use crate::symmetric::SymmetricKey;

/// One endpoint's copy of a pairwise key
///
/// Each side of a handshake holds its own copy; renegotiation replaces the
/// whole value rather than updating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairKey<I: PeerIdentity> {
    /// The other endpoint of the handshake
    pub peer: I,
    pub key: SymmetricKey,
    pub created_at: SimTime,
}

impl<I: PeerIdentity> PairKey<I> {
    pub fn new(peer: I, key: SymmetricKey, created_at: SimTime) -> Self {
        Self {
            peer,
            key,
            created_at,
        }
    }

    /// True once `created_at + ttl <= now`
    pub fn is_expired(&self, now: SimTime, ttl: Duration) -> bool {
        now.has_expired(self.created_at, ttl)
    }

    /// Whether `self` should replace `other` when both describe the same peer
    ///
    /// Newer keys win; equal timestamps fall back to the smaller key bytes.
    pub fn supersedes(&self, other: &PairKey<I>) -> bool {
        match self.created_at.cmp(&other.created_at) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.key < other.key,
        }
    }
}

/// A broker's pairwise keys, one per peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairKeyStore<I: PeerIdentity> {
    keys: BTreeMap<I, PairKey<I>>,
}

impl<I: PeerIdentity> Default for PairKeyStore<I> {
    fn default() -> Self {
        Self {
            keys: BTreeMap::new(),
        }
    }
}

impl<I: PeerIdentity> PairKeyStore<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, peer: &I) -> Option<&PairKey<I>> {
        self.keys.get(peer)
    }

    /// Key for `peer` that is still valid at `now`
    pub fn get_fresh(&self, peer: &I, now: SimTime, ttl: Duration) -> Option<&PairKey<I>> {
        self.keys.get(peer).filter(|k| !k.is_expired(now, ttl))
    }

    /// Store `key`, replacing any previous key for the same peer
    pub fn insert(&mut self, key: PairKey<I>) -> Option<PairKey<I>> {
        self.keys.insert(key.peer.clone(), key)
    }

    pub fn remove(&mut self, peer: &I) -> Option<PairKey<I>> {
        self.keys.remove(peer)
    }

    /// Drop every key that has expired at `now`, returning how many were dropped
    pub fn evict_expired(&mut self, now: SimTime, ttl: Duration) -> usize {
        let before = self.keys.len();
        self.keys.retain(|_, k| !k.is_expired(now, ttl));
        before - self.keys.len()
    }

    /// Copy in every key from `other` that supersedes ours
    ///
    /// Returns the number of peers whose key changed.
    pub fn merge_from(&mut self, other: &PairKeyStore<I>) -> usize {
        let mut changed = 0;
        for (peer, theirs) in &other.keys {
            let adopt = match self.keys.get(peer) {
                Some(ours) => theirs.supersedes(ours),
                None => true,
            };
            if adopt {
                self.keys.insert(peer.clone(), theirs.clone());
                changed += 1;
            }
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PairKey<I>> {
        self.keys.values()
    }

    pub fn peers(&self) -> impl Iterator<Item = &I> {
        self.keys.keys()
    }
}
