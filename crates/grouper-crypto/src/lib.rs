//! # Grouper Crypto
//!
//! Cryptographic primitives for the Grouper key hierarchy.
//!
//! Brokers share one pairwise key with every publisher and subscriber they
//! meet, negotiated with a two-message Diffie-Hellman handshake. Events are
//! sealed once per segment under a group key, and the group key is wrapped
//! individually under each member's pairwise key.
//!
//! ## Key Types
//!
//! - [`SymmetricKey`]: ChaCha20-Poly1305 key with nonce-prefixed sealing
//! - [`DhOffer`] / [`DhReply`] / [`PendingHandshake`]: The handshake messages
//! - [`PairKey`] / [`PairKeyStore`]: Pairwise keys with expiry
//! - [`wrap_key`] / [`unwrap_key`]: Group-key wrapping
//!
//! ## Example
//!
//! ```rust
//! use grouper_core::{HostAddress, SimTime};
//! use grouper_crypto::{exchange, unwrap_key, wrap_key, SymmetricKey};
//!
//! let (broker_copy, sub_copy) =
//!     exchange(&HostAddress(1), &HostAddress(2), SimTime::ZERO).unwrap();
//!
//! let group = SymmetricKey::generate();
//! let blob = wrap_key(&broker_copy.key, &group).unwrap();
//! assert_eq!(unwrap_key(&sub_copy.key, &blob).unwrap(), group);
//! ```

pub mod error;
pub mod exchange;
pub mod pair_key;
pub mod symmetric;
pub mod wrap;

// Re-exports
pub use error::{CryptoError, CryptoResult};
pub use exchange::{
    DhGroup, DhOffer, DhReply, PUBLIC_SIZE, PendingHandshake, exchange, normalize_secret, respond,
};
pub use pair_key::{PairKey, PairKeyStore};
pub use symmetric::{KEY_SIZE, NONCE_SIZE, SymmetricKey, TAG_SIZE};
pub use wrap::{unwrap_key, wrap_key};
