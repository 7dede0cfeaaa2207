//! Key statistics collected from observability events
//!
//! [`KeyStats`] is installed as the sink of every host in a [`World`](crate::World).
//! It counts what each host created or opened and renders the totals as a
//! [`KeyReport`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use grouper_core::{EventPoint, HostAddress, KeyEvent, KeyEventSink, RoleKind};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Default)]
struct Counters {
    roles: BTreeMap<HostAddress, RoleKind>,
    pair_keys: BTreeMap<HostAddress, usize>,
    group_keys: BTreeMap<HostAddress, usize>,
    segments: BTreeMap<HostAddress, usize>,
    recomputations: usize,
    opened: BTreeMap<HostAddress, usize>,
    opened_events: BTreeMap<HostAddress, BTreeSet<EventPoint>>,
    reconciliations: usize,
}

/// Aggregating [`KeyEventSink`]
#[derive(Debug, Default)]
pub struct KeyStats {
    inner: Mutex<Counters>,
}

impl KeyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the role of a host so per-role totals can be reported
    pub fn register(&self, host: HostAddress, kind: RoleKind) {
        self.inner.lock().roles.insert(host, kind);
    }

    /// Pairwise keys created on `host`
    pub fn pair_keys_for(&self, host: &HostAddress) -> usize {
        self.inner.lock().pair_keys.get(host).copied().unwrap_or(0)
    }

    /// Group keys generated by `broker`
    pub fn group_keys_for(&self, broker: &HostAddress) -> usize {
        self.inner.lock().group_keys.get(broker).copied().unwrap_or(0)
    }

    /// Encrypted bundles opened by `subscriber`
    pub fn opened_for(&self, subscriber: &HostAddress) -> usize {
        self.inner.lock().opened.get(subscriber).copied().unwrap_or(0)
    }

    /// Distinct events `subscriber` has decrypted
    pub fn events_for(&self, subscriber: &HostAddress) -> BTreeSet<EventPoint> {
        self.inner
            .lock()
            .opened_events
            .get(subscriber)
            .cloned()
            .unwrap_or_default()
    }

    pub fn report(&self) -> KeyReport {
        let inner = self.inner.lock();
        let pair_keys_of = |kind: RoleKind| -> usize {
            inner
                .pair_keys
                .iter()
                .filter(|(host, _)| inner.roles.get(*host) == Some(&kind))
                .map(|(_, n)| n)
                .sum()
        };

        KeyReport {
            created_group_keys: inner.group_keys.values().sum(),
            opened_messages: inner.opened.values().sum(),
            created_pair_keys: inner.pair_keys.values().sum(),
            created_segments: inner.segments.values().sum(),
            pair_keys_by_broker: pair_keys_of(RoleKind::Broker),
            pair_keys_by_publisher: pair_keys_of(RoleKind::Publisher),
            pair_keys_by_subscriber: pair_keys_of(RoleKind::Subscriber),
            recomputations: inner.recomputations,
            reconciliations: inner.reconciliations,
            subscribers: inner
                .roles
                .values()
                .filter(|k| **k == RoleKind::Subscriber)
                .count(),
            subscribers_reached: inner.opened.values().filter(|n| **n > 0).count(),
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let roles = std::mem::take(&mut inner.roles);
        *inner = Counters {
            roles,
            ..Default::default()
        };
    }
}

impl KeyEventSink<HostAddress> for KeyStats {
    fn emit(&self, event: KeyEvent<HostAddress>) {
        let mut inner = self.inner.lock();
        match event {
            KeyEvent::KeyPairCreated { host, .. } => {
                *inner.pair_keys.entry(host).or_default() += 1;
            }
            KeyEvent::GroupKeyCreated { broker, .. } => {
                *inner.group_keys.entry(broker).or_default() += 1;
            }
            KeyEvent::GroupsRecomputed {
                broker, segments, ..
            } => {
                inner.recomputations += 1;
                *inner.segments.entry(broker).or_default() += segments;
            }
            KeyEvent::MessageOpened {
                subscriber, events, ..
            } => {
                *inner.opened.entry(subscriber).or_default() += 1;
                inner
                    .opened_events
                    .entry(subscriber)
                    .or_default()
                    .extend(events);
            }
            // Both brokers report the same reconciliation
            KeyEvent::CachesReconciled { local, remote, .. } => {
                if local < remote {
                    inner.reconciliations += 1;
                }
            }
        }
    }
}

/// Totals over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KeyReport {
    pub created_group_keys: usize,
    pub opened_messages: usize,
    pub created_pair_keys: usize,
    /// Segments summed over every recomputation
    pub created_segments: usize,
    pub pair_keys_by_broker: usize,
    pub pair_keys_by_publisher: usize,
    pub pair_keys_by_subscriber: usize,
    pub recomputations: usize,
    pub reconciliations: usize,
    pub subscribers: usize,
    pub subscribers_reached: usize,
}

impl fmt::Display for KeyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "createdGroupKeys        : {}", self.created_group_keys)?;
        writeln!(f, "openedMessages          : {}", self.opened_messages)?;
        writeln!(f, "createdPairKeys         : {}", self.created_pair_keys)?;
        writeln!(f, "  by brokers            : {}", self.pair_keys_by_broker)?;
        writeln!(f, "  by publishers         : {}", self.pair_keys_by_publisher)?;
        writeln!(f, "  by subscribers        : {}", self.pair_keys_by_subscriber)?;
        writeln!(f, "createdSegments         : {}", self.created_segments)?;
        writeln!(f, "recomputations          : {}", self.recomputations)?;
        writeln!(f, "cacheReconciliations    : {}", self.reconciliations)?;
        write!(
            f,
            "subscribersReached      : {}/{}",
            self.subscribers_reached, self.subscribers
        )
    }
}
