//! PIN hashing for transport
//!
//! PIN material never leaves the host in clear text. Every request that
//! carries a PIN carries `sha256(pin || PIN_SALT)` instead.

use sha2::{Digest, Sha256};
use tracing::trace;

use crate::constants::PIN_SALT;

/// Hash a PIN for inclusion in an init or unlock request
///
/// # Examples
///
/// ```
/// use oskey_core::pin;
///
/// let hash = pin::hash_pin("Abcdefg1");
/// assert_eq!(hash.len(), 32);
/// assert_eq!(hash, pin::hash_pin("Abcdefg1"));
/// ```
pub fn hash_pin(pin: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hasher.update(PIN_SALT.as_bytes());
    let hash: [u8; 32] = hasher.finalize().into();

    trace!(pin_len = pin.len(), "Hashed PIN");

    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_pin_known_value() {
        assert_eq!(
            hex::encode(hash_pin("Abcdefg1")),
            "daacb3f6a9f0ff83f86d46d7d144f623f2ea0d582bd232b9a7f7b66864dc748d"
        );
    }

    #[test]
    fn test_hash_pin_is_salted() {
        let unsalted: [u8; 32] = Sha256::digest("Abcdefg1".as_bytes()).into();
        assert_ne!(hash_pin("Abcdefg1"), unsalted);
    }

    #[test]
    fn test_different_pins() {
        assert_ne!(hash_pin("Abcdefg1"), hash_pin("Abcdefg2"));
    }

    #[test]
    fn test_utf8_pin() {
        // Multi-byte characters are hashed by their UTF-8 bytes
        let mut hasher = Sha256::new();
        hasher.update("Pässwort1".as_bytes());
        hasher.update(PIN_SALT.as_bytes());
        let expected: [u8; 32] = hasher.finalize().into();
        assert_eq!(hash_pin("Pässwort1"), expected);
    }
}
