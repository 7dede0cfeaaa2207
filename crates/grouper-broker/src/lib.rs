//! # Grouper Broker
//!
//! Broker-side grouping and key management for the Grouper overlay.
//!
//! A broker collects interest ranges from subscribers and events from
//! publishers. It partitions the ranges into segments with the
//! [`merge`] sweep, keeps one group key per exact member set in its
//! [`GroupKeyCache`], and encrypts each matched segment once, wrapping the
//! group key for every member it shares a pairwise key with.
//!
//! ## Hooks
//!
//! The external transport drives everything through four calls:
//!
//! - [`on_connected`]: Pairwise handshake or broker/broker reconciliation
//! - [`on_application_payload`]: Filters, Events and Encrypted payloads
//! - [`recompute_groups`]: Full re-merge of the interest table
//! - [`dispatch_pending`]: Encrypt the queued events into the outbox
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use grouper_broker::{Host, KeyPolicy, dispatch_pending, on_application_payload,
//!     on_connected, recompute_groups};
//! use grouper_core::{EventPoint, HostAddress, InterestRange, NoopSink, SimTime};
//!
//! let sink = Arc::new(NoopSink);
//! let policy = KeyPolicy::default();
//! let now = SimTime::ZERO;
//!
//! let mut broker = Host::broker(HostAddress(1), policy.clone(), sink.clone());
//! let mut sub = Host::subscriber(
//!     HostAddress(2),
//!     vec![InterestRange::new(true, 0, 10).unwrap()],
//!     policy.clone(),
//!     sink.clone(),
//! );
//!
//! on_connected(&mut broker, &mut sub, now).unwrap();
//! let filters = sub.subscribe(now).unwrap();
//! on_application_payload(&mut broker, &filters, sub.id(), now).unwrap();
//! recompute_groups(&mut broker, now);
//!
//! let events = grouper_core::ApplicationPayload::Events(vec![EventPoint::new(true, 4).unwrap()]);
//! on_application_payload(&mut broker, &events, &HostAddress(3), now).unwrap();
//! dispatch_pending(&mut broker, now).unwrap();
//!
//! let encrypted = broker.outbox().unwrap();
//! on_application_payload(&mut sub, &encrypted, broker.id(), now).unwrap();
//! assert_eq!(sub.received_events().len(), 1);
//! ```

pub mod cache;
pub mod config;
pub mod contact;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod interest;
pub mod merge;

// Re-exports
pub use cache::{GroupKeyCache, GroupKeyEntry};
pub use config::KeyPolicy;
pub use contact::{
    ContactOutcome, PayloadOutcome, dispatch_pending, on_application_payload, on_connected,
    recompute_groups,
};
pub use dispatch::{DispatchContext, DispatchOutcome, dispatch, open_bundle, try_open};
pub use error::{BrokerError, BrokerResult};
pub use host::{BrokerState, Host, OpenedMessage, PublisherState, Role, SubscriberState};
pub use interest::InterestTable;
pub use merge::merge;
