//! Broker-specific error types

use thiserror::Error;

use grouper_core::{CodecError, RoleKind};
use grouper_crypto::CryptoError;

/// Errors that can occur on the broker side of the overlay
///
/// Routine outcomes are not errors: a subscriber failing to open a bundle
/// yields `None`, and a contact between ineligible roles is reported as
/// [`ContactOutcome::Ineligible`](crate::ContactOutcome::Ineligible).
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Cryptographic failure on the broker's own path (sealing, handshake)
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Payload could not be encoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Operation requires a role the host does not carry
    #[error("Operation requires a {expected}, host is a {actual}")]
    WrongRole { expected: RoleKind, actual: RoleKind },

    /// Policy file could not be parsed
    #[error("Invalid key policy: {0}")]
    InvalidPolicy(String),
}

/// Result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;
