//! # Grouper Core
//!
//! Core traits, types, and errors for the Grouper pub/sub key overlay.
//!
//! The overlay has three roles. Subscribers submit numeric interest ranges
//! to brokers, publishers submit event points, and brokers partition the
//! overlapping interest into subscriber-tagged segments so that each matching
//! event is encrypted once per segment under a shared group key.
//!
//! This crate holds the vocabulary shared by every other crate:
//!
//! - [`PeerIdentity`]: Abstraction over host identification
//! - [`SimTime`] / [`Clock`]: The external simulation clock
//! - [`InterestRange`], [`EventPoint`], [`Segment`]: The interval model
//! - [`RoleKind`]: Which capability a host carries
//! - [`ApplicationPayload`]: Payloads exchanged through the external transport
//! - [`KeyEvent`] / [`KeyEventSink`]: Observability hooks

pub mod error;
pub mod event;
pub mod identity;
pub mod interval;
pub mod payload;
pub mod role;
pub mod time;

// Re-export main types
pub use error::*;
pub use event::*;
pub use identity::*;
pub use interval::*;
pub use payload::*;
pub use role::*;
pub use time::*;
