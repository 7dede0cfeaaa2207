//! Two-message Diffie-Hellman handshake
//!
//! The initiator picks a group, generates a secret and sends a [`DhOffer`]
//! carrying the group and its public value. The responder, using the same
//! group, answers with a [`DhReply`] and derives the shared secret at once;
//! the initiator derives it when the reply arrives. Both sides then normalize
//! the secret into a [`SymmetricKey`].

use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};

use grouper_core::{PeerIdentity, SimTime};

use crate::error::{CryptoError, CryptoResult};
use crate::pair_key::PairKey;
use crate::symmetric::{KEY_SIZE, SymmetricKey};

/// Size of a public value on the wire
pub const PUBLIC_SIZE: usize = 32;

/// Diffie-Hellman group parameters named in an offer
///
/// `X25519` is Curve25519 in Montgomery form: prime `2^255 - 19` with base
/// point `u = 9`. It is the only group the overlay ships and is shared
/// process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DhGroup {
    #[default]
    X25519,
}

impl DhGroup {
    pub fn name(&self) -> &'static str {
        match self {
            DhGroup::X25519 => "x25519",
        }
    }

    /// Look up a group by its wire tag
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(DhGroup::X25519),
            _ => None,
        }
    }
}

/// First message: group and initiator public value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhOffer {
    pub group: DhGroup,
    pub public: [u8; PUBLIC_SIZE],
}

/// Offer as it sits on the wire, group tag not yet resolved
///
/// Postcard writes a unit variant as its varint index, so this decodes the
/// same bytes as [`DhOffer`].
#[derive(Deserialize)]
struct WireOffer {
    group: u32,
    public: [u8; PUBLIC_SIZE],
}

/// Second message: responder public value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhReply {
    pub public: [u8; PUBLIC_SIZE],
}

impl DhOffer {
    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| CryptoError::KeyExchangeFailed(e.to_string()))
    }

    /// Decode an offer; an unknown group tag is rejected here
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        let wire: WireOffer =
            postcard::from_bytes(data).map_err(|e| CryptoError::KeyExchangeFailed(e.to_string()))?;
        let group = DhGroup::from_tag(wire.group)
            .ok_or_else(|| CryptoError::UnsupportedGroup(format!("group tag {}", wire.group)))?;
        Ok(Self {
            group,
            public: wire.public,
        })
    }
}

impl DhReply {
    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|e| CryptoError::KeyExchangeFailed(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        postcard::from_bytes(data).map_err(|e| CryptoError::KeyExchangeFailed(e.to_string()))
    }
}

/// Initiator state between sending the offer and receiving the reply
pub struct PendingHandshake {
    group: DhGroup,
    secret: StaticSecret,
}

/// Generate a random secret (compatible with x25519-dalek's rand_core version)
fn random_secret() -> StaticSecret {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    StaticSecret::from(bytes)
}

impl PendingHandshake {
    /// Start a handshake in `group`
    pub fn initiate(group: DhGroup) -> (Self, DhOffer) {
        let secret = random_secret();
        let offer = DhOffer {
            group,
            public: PublicKey::from(&secret).to_bytes(),
        };
        (Self { group, secret }, offer)
    }

    pub fn group(&self) -> DhGroup {
        self.group
    }

    /// Finish the handshake with the responder's reply
    pub fn complete(self, reply: &DhReply) -> CryptoResult<SymmetricKey> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(reply.public));
        derive(shared)
    }
}

/// Answer an offer, returning the reply to send and the derived key
///
/// The responder always works in the group the offer names.
pub fn respond(offer: &DhOffer) -> CryptoResult<(DhReply, SymmetricKey)> {
    let secret = random_secret();
    let reply = DhReply {
        public: PublicKey::from(&secret).to_bytes(),
    };
    let shared = secret.diffie_hellman(&PublicKey::from(offer.public));
    Ok((reply, derive(shared)?))
}

fn derive(shared: SharedSecret) -> CryptoResult<SymmetricKey> {
    if !shared.was_contributory() {
        return Err(CryptoError::KeyExchangeFailed(
            "non-contributory shared secret".to_string(),
        ));
    }
    Ok(normalize_secret(shared.as_bytes()))
}

/// Fit a shared secret into a [`KEY_SIZE`] key
///
/// Longer secrets keep their least-significant (trailing) bytes; shorter ones
/// are left-padded with zeros.
pub fn normalize_secret(secret: &[u8]) -> SymmetricKey {
    let mut key = [0u8; KEY_SIZE];
    if secret.len() >= KEY_SIZE {
        key.copy_from_slice(&secret[secret.len() - KEY_SIZE..]);
    } else {
        key[KEY_SIZE - secret.len()..].copy_from_slice(secret);
    }
    SymmetricKey::from_bytes(key)
}

/// Run both halves of a handshake between `local` and `peer`
///
/// Messages still pass through their wire encoding so each side only sees
/// what the other actually sent. Returns `(local's copy, peer's copy)`.
pub fn exchange<I: PeerIdentity>(
    local: &I,
    peer: &I,
    now: SimTime,
) -> CryptoResult<(PairKey<I>, PairKey<I>)> {
    let (pending, offer) = PendingHandshake::initiate(DhGroup::default());

    let offer = DhOffer::from_bytes(&offer.to_bytes()?)?;
    let (reply, peer_key) = respond(&offer)?;

    let reply = DhReply::from_bytes(&reply.to_bytes()?)?;
    let local_key = pending.complete(&reply)?;

    Ok((
        PairKey::new(peer.clone(), local_key, now),
        PairKey::new(local.clone(), peer_key, now),
    ))
}
