//! Observability events
//!
//! Every state change a reporting collaborator may care about is emitted
//! synchronously into an injected [`KeyEventSink`]. Sinks are fire-and-forget:
//! the overlay never reads anything back from them.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::identity::PeerIdentity;
use crate::interval::{EventPoint, MemberSet};
use crate::time::SimTime;

/// Events raised by the key lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity")]
pub enum KeyEvent<I: PeerIdentity> {
    /// A pairwise handshake completed on `host` with `peer`
    KeyPairCreated { host: I, peer: I, at: SimTime },

    /// A broker generated a fresh group key for `members`
    GroupKeyCreated {
        broker: I,
        members: MemberSet<I>,
        at: SimTime,
    },

    /// A broker replaced its segment list
    GroupsRecomputed {
        broker: I,
        segments: usize,
        at: SimTime,
    },

    /// A subscriber opened an encrypted payload
    MessageOpened {
        subscriber: I,
        events: Vec<EventPoint>,
        at: SimTime,
    },

    /// Two brokers unioned their group-key caches
    CachesReconciled {
        local: I,
        remote: I,
        entries: usize,
        at: SimTime,
    },
}

impl<I: PeerIdentity> KeyEvent<I> {
    /// Simulation time at which the event happened
    pub fn at(&self) -> SimTime {
        match self {
            KeyEvent::KeyPairCreated { at, .. }
            | KeyEvent::GroupKeyCreated { at, .. }
            | KeyEvent::GroupsRecomputed { at, .. }
            | KeyEvent::MessageOpened { at, .. }
            | KeyEvent::CachesReconciled { at, .. } => *at,
        }
    }
}

/// Receiver for [`KeyEvent`]s
pub trait KeyEventSink<I: PeerIdentity>: Send + Sync {
    fn emit(&self, event: KeyEvent<I>);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl<I: PeerIdentity> KeyEventSink<I> for NoopSink {
    fn emit(&self, _event: KeyEvent<I>) {}
}

/// Sink that keeps every event in memory, for assertions
#[derive(Debug)]
pub struct RecordingSink<I: PeerIdentity> {
    events: Mutex<Vec<KeyEvent<I>>>,
}

impl<I: PeerIdentity> Default for RecordingSink<I> {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl<I: PeerIdentity> RecordingSink<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn events(&self) -> Vec<KeyEvent<I>> {
        self.events.lock().clone()
    }

    /// Number of recorded events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&KeyEvent<I>) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl<I: PeerIdentity> KeyEventSink<I> for RecordingSink<I> {
    fn emit(&self, event: KeyEvent<I>) {
        self.events.lock().push(event);
    }
}
