//! Peer identity abstractions
//!
//! This module provides the [`PeerIdentity`] trait so the grouping and key
//! logic can run over simulation addresses in tests and over any other
//! identity scheme a transport supplies.

use std::fmt::{Debug, Display};
use std::hash::Hash;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::IdentityError;

/// Trait for peer identity abstraction
///
/// Identities are totally ordered so that member sets have one canonical
/// form: two sets holding the same identities compare equal regardless of
/// the order in which members were observed.
pub trait PeerIdentity:
    Clone + Eq + Ord + Hash + Send + Sync + Debug + Display + Serialize + DeserializeOwned + 'static
{
    /// Get the identity as bytes
    fn as_bytes(&self) -> Vec<u8>;

    /// Create an identity from bytes
    fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError>;

    /// Get a short display form (for logging)
    fn short_id(&self) -> String {
        format!("{}", self)
    }
}

/// Numeric host address used by the simulation driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostAddress(pub u32);

impl HostAddress {
    /// Create a host address
    pub fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// Generate `count` consecutive addresses starting at `first`
    pub fn range(first: u32, count: u32) -> Vec<Self> {
        (first..first + count).map(Self).collect()
    }

    /// Get the underlying address
    pub fn addr(&self) -> u32 {
        self.0
    }
}

impl Display for HostAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "h{}", self.0)
    }
}

impl PeerIdentity for HostAddress {
    fn as_bytes(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let raw: [u8; 4] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidLength {
                expected: 4,
                actual: bytes.len(),
            })?;
        Ok(Self(u32::from_be_bytes(raw)))
    }

    fn short_id(&self) -> String {
        self.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_address_range() {
        let ids = HostAddress::range(3, 3);
        assert_eq!(ids, vec![HostAddress(3), HostAddress(4), HostAddress(5)]);
    }

    #[test]
    fn test_host_address_bytes_roundtrip() {
        let id = HostAddress::new(0x0102_0304);
        let recovered = HostAddress::from_bytes(&id.as_bytes()).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_host_address_rejects_wrong_length() {
        let err = HostAddress::from_bytes(&[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            IdentityError::InvalidLength {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(HostAddress(12).to_string(), "h12");
        assert_eq!(HostAddress(12).short_id(), "12");
    }
}
