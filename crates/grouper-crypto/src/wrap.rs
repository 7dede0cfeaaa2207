//! Group-key wrapping under pairwise keys

use crate::error::{CryptoError, CryptoResult};
use crate::symmetric::{KEY_SIZE, SymmetricKey};

/// Encrypt `group_key` under `pair_key` for one member
pub fn wrap_key(pair_key: &SymmetricKey, group_key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    pair_key.seal(group_key.as_bytes())
}

/// Recover a group key wrapped by [`wrap_key`]
///
/// Fails if `pair_key` is not the key the blob was wrapped under.
pub fn unwrap_key(pair_key: &SymmetricKey, wrapped: &[u8]) -> CryptoResult<SymmetricKey> {
    let raw = pair_key.open(wrapped)?;
    if raw.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKey(
            "Unwrapped key has wrong length".to_string(),
        ));
    }
    SymmetricKey::try_from_slice(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_wrap_unwrap() {
        let pair = SymmetricKey::generate();
        let group = SymmetricKey::generate();

        let blob = wrap_key(&pair, &group).unwrap();
        assert_eq!(unwrap_key(&pair, &blob).unwrap(), group);
    }

    #[test]
    fn test_unwrap_with_other_key_fails() {
        let pair = SymmetricKey::generate();
        let other = SymmetricKey::generate();
        let group = SymmetricKey::generate();

        let blob = wrap_key(&pair, &group).unwrap();
        assert!(unwrap_key(&other, &blob).is_err());
    }

    #[test]
    fn test_unwrap_rejects_non_key_plaintext() {
        let pair = SymmetricKey::generate();
        let blob = pair.seal(b"not a key").unwrap();
        assert!(matches!(
            unwrap_key(&pair, &blob),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_wrap_round_trip(pair in any::<[u8; 32]>(), group in any::<[u8; 32]>(), other in any::<[u8; 32]>()) {
            let pair = SymmetricKey::from_bytes(pair);
            let group = SymmetricKey::from_bytes(group);
            let blob = wrap_key(&pair, &group).unwrap();

            prop_assert_eq!(unwrap_key(&pair, &blob).unwrap(), group);

            let other = SymmetricKey::from_bytes(other);
            if other != pair {
                prop_assert!(unwrap_key(&other, &blob).is_err());
            }
        }
    }
}
