//! Hosts and their role capability records
//!
//! A host is one entity with an identity, a key policy, an observability sink
//! and exactly one role. Role-specific state lives in the role's capability
//! record; code that needs it matches on [`Role`].

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use grouper_core::{
    ApplicationPayload, EncryptedBundle, EventPoint, InterestRange, KeyEventSink, PeerIdentity,
    RoleKind, Segment, SimTime,
};
use grouper_crypto::{PairKey, PairKeyStore};

use crate::cache::GroupKeyCache;
use crate::config::KeyPolicy;
use crate::interest::InterestTable;

/// Broker capability record
#[derive(Debug, Clone)]
pub struct BrokerState<I: PeerIdentity> {
    pub(crate) pair_keys: PairKeyStore<I>,
    pub(crate) interests: InterestTable<I>,
    pub(crate) pending_events: BTreeSet<EventPoint>,
    pub(crate) segments: Vec<Segment<I>>,
    pub(crate) cache: GroupKeyCache<I>,
    pub(crate) outbox: Vec<EncryptedBundle>,
}

impl<I: PeerIdentity> Default for BrokerState<I> {
    fn default() -> Self {
        Self {
            pair_keys: PairKeyStore::new(),
            interests: InterestTable::new(),
            pending_events: BTreeSet::new(),
            segments: Vec::new(),
            cache: GroupKeyCache::new(),
            outbox: Vec::new(),
        }
    }
}

impl<I: PeerIdentity> BrokerState<I> {
    pub fn pair_keys(&self) -> &PairKeyStore<I> {
        &self.pair_keys
    }

    pub fn interests(&self) -> &InterestTable<I> {
        &self.interests
    }

    pub fn pending_events(&self) -> &BTreeSet<EventPoint> {
        &self.pending_events
    }

    /// Segments from the latest [`recompute_groups`](crate::recompute_groups)
    pub fn segments(&self) -> &[Segment<I>] {
        &self.segments
    }

    pub fn cache(&self) -> &GroupKeyCache<I> {
        &self.cache
    }

    /// Bundles from the latest non-empty dispatch pass
    pub fn outbox(&self) -> &[EncryptedBundle] {
        &self.outbox
    }
}

/// Publisher capability record
#[derive(Debug, Clone)]
pub struct PublisherState<I: PeerIdentity> {
    pub(crate) pair_key: Option<PairKey<I>>,
    pub(crate) events: Vec<EventPoint>,
}

/// Subscriber capability record
#[derive(Debug, Clone)]
pub struct SubscriberState<I: PeerIdentity> {
    pub(crate) pair_key: Option<PairKey<I>>,
    pub(crate) filters: Vec<InterestRange>,
    pub(crate) opened: Vec<OpenedMessage>,
    /// Ciphertexts already opened, per sending broker, limited to that
    /// broker's latest outbox
    pub(crate) seen_ciphertexts: BTreeMap<I, HashSet<Vec<u8>>>,
}

impl<I: PeerIdentity> SubscriberState<I> {
    pub fn filters(&self) -> &[InterestRange] {
        &self.filters
    }

    pub fn opened(&self) -> &[OpenedMessage] {
        &self.opened
    }

    /// Number of ciphertexts remembered for duplicate suppression
    pub fn remembered_ciphertexts(&self) -> usize {
        self.seen_ciphertexts.values().map(HashSet::len).sum()
    }
}

/// A payload a subscriber managed to decrypt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedMessage {
    pub events: Vec<EventPoint>,
    pub at: SimTime,
}

/// Tagged union of role capabilities
#[derive(Debug, Clone)]
pub enum Role<I: PeerIdentity> {
    Broker(BrokerState<I>),
    Publisher(PublisherState<I>),
    Subscriber(SubscriberState<I>),
}

impl<I: PeerIdentity> Role<I> {
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Broker(_) => RoleKind::Broker,
            Role::Publisher(_) => RoleKind::Publisher,
            Role::Subscriber(_) => RoleKind::Subscriber,
        }
    }

    /// The single pairwise key slot of a publisher or subscriber
    pub(crate) fn endpoint_slot(&mut self) -> Option<&mut Option<PairKey<I>>> {
        match self {
            Role::Publisher(state) => Some(&mut state.pair_key),
            Role::Subscriber(state) => Some(&mut state.pair_key),
            Role::Broker(_) => None,
        }
    }
}

/// A participant in the overlay
pub struct Host<I: PeerIdentity> {
    pub(crate) id: I,
    pub(crate) role: Role<I>,
    pub(crate) policy: KeyPolicy,
    pub(crate) sink: Arc<dyn KeyEventSink<I>>,
}

impl<I: PeerIdentity> Host<I> {
    pub fn new(id: I, role: Role<I>, policy: KeyPolicy, sink: Arc<dyn KeyEventSink<I>>) -> Self {
        Self {
            id,
            role,
            policy,
            sink,
        }
    }

    pub fn broker(id: I, policy: KeyPolicy, sink: Arc<dyn KeyEventSink<I>>) -> Self {
        Self::new(id, Role::Broker(BrokerState::default()), policy, sink)
    }

    pub fn publisher(
        id: I,
        events: Vec<EventPoint>,
        policy: KeyPolicy,
        sink: Arc<dyn KeyEventSink<I>>,
    ) -> Self {
        let role = Role::Publisher(PublisherState {
            pair_key: None,
            events,
        });
        Self::new(id, role, policy, sink)
    }

    pub fn subscriber(
        id: I,
        filters: Vec<InterestRange>,
        policy: KeyPolicy,
        sink: Arc<dyn KeyEventSink<I>>,
    ) -> Self {
        let role = Role::Subscriber(SubscriberState {
            pair_key: None,
            filters,
            opened: Vec::new(),
            seen_ciphertexts: BTreeMap::new(),
        });
        Self::new(id, role, policy, sink)
    }

    pub fn id(&self) -> &I {
        &self.id
    }

    pub fn kind(&self) -> RoleKind {
        self.role.kind()
    }

    pub fn role(&self) -> &Role<I> {
        &self.role
    }

    pub fn policy(&self) -> &KeyPolicy {
        &self.policy
    }

    pub fn as_broker(&self) -> Option<&BrokerState<I>> {
        match &self.role {
            Role::Broker(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_subscriber(&self) -> Option<&SubscriberState<I>> {
        match &self.role {
            Role::Subscriber(state) => Some(state),
            _ => None,
        }
    }

    /// Pairwise key held by a publisher or subscriber, if any yet
    pub fn endpoint_key(&self) -> Option<&PairKey<I>> {
        match &self.role {
            Role::Publisher(state) => state.pair_key.as_ref(),
            Role::Subscriber(state) => state.pair_key.as_ref(),
            Role::Broker(_) => None,
        }
    }

    /// Endpoint key that has not expired at `now`
    pub fn fresh_endpoint_key(&self, now: SimTime) -> Option<&PairKey<I>> {
        self.endpoint_key()
            .filter(|k| !k.is_expired(now, self.policy.pair_key_ttl))
    }

    /// Number of keys this host currently holds
    pub fn key_count(&self) -> usize {
        match &self.role {
            Role::Broker(state) => state.pair_keys.len() + state.cache.len(),
            Role::Publisher(_) | Role::Subscriber(_) => usize::from(self.endpoint_key().is_some()),
        }
    }

    /// Events payload, only once the publisher holds a valid pairwise key
    pub fn publish(&self, now: SimTime) -> Option<ApplicationPayload> {
        match &self.role {
            Role::Publisher(state) if self.fresh_endpoint_key(now).is_some() => {
                Some(ApplicationPayload::Events(state.events.clone()))
            }
            _ => None,
        }
    }

    /// Filters payload, only once the subscriber holds a valid pairwise key
    pub fn subscribe(&self, now: SimTime) -> Option<ApplicationPayload> {
        match &self.role {
            Role::Subscriber(state) if self.fresh_endpoint_key(now).is_some() => {
                Some(ApplicationPayload::Filters(state.filters.clone()))
            }
            _ => None,
        }
    }

    /// Encrypted payload built from the broker outbox
    pub fn outbox(&self) -> Option<ApplicationPayload> {
        match &self.role {
            Role::Broker(state) if !state.outbox.is_empty() => {
                Some(ApplicationPayload::Encrypted(state.outbox.clone()))
            }
            _ => None,
        }
    }

    /// Every distinct event this subscriber has decrypted
    pub fn received_events(&self) -> BTreeSet<EventPoint> {
        match &self.role {
            Role::Subscriber(state) => state
                .opened
                .iter()
                .flat_map(|m| m.events.iter().copied())
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    /// Forget every interest range submitted by `owner`
    pub fn retract_interest(&mut self, owner: &I) -> usize {
        match &mut self.role {
            Role::Broker(state) => state.interests.retract(owner),
            _ => 0,
        }
    }
}

impl<I: PeerIdentity> fmt::Debug for Host<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
