//! Application payloads exchanged through the external transport
//!
//! The transport only sees opaque payloads tagged with a [`PayloadKind`];
//! the overlay decides what each kind means for a given role.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::interval::{EventPoint, InterestRange};

/// Kind tag used by the transport to select payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    Events,
    Filters,
    Encrypted,
}

/// One ciphertext plus every wrapped copy of the key that opens it
///
/// There is no addressing metadata: a subscriber tries each wrapped key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncryptedBundle {
    /// Nonce-prefixed ciphertext of the segment payload
    pub ciphertext: Vec<u8>,
    /// Group key wrapped once per member holding a pairwise key
    pub wrapped_keys: Vec<Vec<u8>>,
}

impl EncryptedBundle {
    /// Every `(ciphertext, wrapped_key)` pair a receiver may try
    pub fn candidates(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.wrapped_keys
            .iter()
            .map(move |wrapped| (self.ciphertext.as_slice(), wrapped.as_slice()))
    }
}

/// Application payload carried by one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationPayload {
    /// Interest ranges submitted by a subscriber
    Filters(Vec<InterestRange>),
    /// Event points submitted by a publisher
    Events(Vec<EventPoint>),
    /// One dispatch pass of encrypted bundles
    Encrypted(Vec<EncryptedBundle>),
}

impl ApplicationPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            ApplicationPayload::Filters(_) => PayloadKind::Filters,
            ApplicationPayload::Events(_) => PayloadKind::Events,
            ApplicationPayload::Encrypted(_) => PayloadKind::Encrypted,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ApplicationPayload::Filters(ranges) => ranges.is_empty(),
            ApplicationPayload::Events(events) => events.is_empty(),
            ApplicationPayload::Encrypted(bundles) => bundles.is_empty(),
        }
    }

    /// Serialize for the wire
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        postcard::to_allocvec(self).map_err(|e| CodecError::Serialization(e.to_string()))
    }

    /// Deserialize from the wire
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        postcard::from_bytes(bytes).map_err(|e| CodecError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        let filters = ApplicationPayload::Filters(vec![InterestRange::new(true, 0, 4).unwrap()]);
        assert_eq!(filters.kind(), PayloadKind::Filters);
        assert!(!filters.is_empty());

        let events = ApplicationPayload::Events(vec![]);
        assert_eq!(events.kind(), PayloadKind::Events);
        assert!(events.is_empty());

        assert_eq!(
            ApplicationPayload::Encrypted(vec![]).kind(),
            PayloadKind::Encrypted
        );
    }

    #[test]
    fn test_wire_format() {
        let payload = ApplicationPayload::Encrypted(vec![EncryptedBundle {
            ciphertext: vec![1, 2, 3],
            wrapped_keys: vec![vec![4], vec![5, 6]],
        }]);

        let bytes = payload.to_bytes().unwrap();
        assert_eq!(ApplicationPayload::from_bytes(&bytes).unwrap(), payload);

        assert!(ApplicationPayload::from_bytes(&[0xff, 0xff]).is_err());
    }

    #[test]
    fn test_bundle_candidates() {
        let bundle = EncryptedBundle {
            ciphertext: vec![9, 9],
            wrapped_keys: vec![vec![1], vec![2]],
        };
        let pairs: Vec<_> = bundle.candidates().collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], (&[9u8, 9][..], &[1u8][..]));
        assert_eq!(pairs[1].1, &[2u8][..]);
    }
}
