//! Role kinds and role-pair classification

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which capability a host carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoleKind {
    Broker,
    Publisher,
    Subscriber,
}

/// What a contact between two roles can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolePair {
    /// One broker and one publisher or subscriber: a pairwise key can be shared
    BrokerPeer,
    /// Two brokers: caches reconcile
    BrokerBroker,
    /// Nothing to exchange
    Ineligible,
}

impl RoleKind {
    pub fn is_broker(&self) -> bool {
        matches!(self, RoleKind::Broker)
    }

    /// Publishers and subscribers are the endpoints a broker keys with
    pub fn is_endpoint(&self) -> bool {
        matches!(self, RoleKind::Publisher | RoleKind::Subscriber)
    }

    /// Classify a contact between `self` and `other`
    pub fn pair_with(&self, other: RoleKind) -> RolePair {
        match (self, other) {
            (RoleKind::Broker, RoleKind::Broker) => RolePair::BrokerBroker,
            (RoleKind::Broker, RoleKind::Publisher | RoleKind::Subscriber)
            | (RoleKind::Publisher | RoleKind::Subscriber, RoleKind::Broker) => {
                RolePair::BrokerPeer
            }
            _ => RolePair::Ineligible,
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoleKind::Broker => "broker",
            RoleKind::Publisher => "publisher",
            RoleKind::Subscriber => "subscriber",
        };
        f.pad(name)
    }
}
