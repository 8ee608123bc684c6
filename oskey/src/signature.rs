//! Signature post-processing
//!
//! The device answers a signing request with a bare 64-byte `r || s`. The
//! recovery id has to be found on the host: both candidates are recovered
//! against the signed digest and the one that yields the account address wins.

use alloy_primitives::{Address, Signature, B256, U256};
use k256::ecdsa::VerifyingKey;
use tracing::{debug, trace};

/// Recovery id suffixes, in the order they are tried
const RECOVERY_SUFFIXES: [u8; 2] = [0x1b, 0x1c];

/// Derive the account address from a secp256k1 public key
///
/// Accepts SEC1 compressed (33 bytes) or uncompressed (65 bytes) keys, and
/// raw 64-byte `x || y` coordinates.
pub fn address_from_public_key(public_key: &[u8]) -> Option<Address> {
    let key = if public_key.len() == 64 {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(public_key);
        VerifyingKey::from_sec1_bytes(&sec1)
    } else {
        VerifyingKey::from_sec1_bytes(public_key)
    };

    match key {
        Ok(key) => Some(Address::from_public_key(&key)),
        Err(e) => {
            debug!(len = public_key.len(), error = %e, "Rejected public key");
            None
        }
    }
}

/// Append the recovery id that makes `signature` recover to `expected`
///
/// Returns the 65-byte signature as `0x` hex, or `None` if neither candidate
/// matches.
///
/// # Examples
///
/// ```
/// use alloy_primitives::{Address, B256};
/// use oskey::signature::recover_and_format;
///
/// // A malformed signature never resolves
/// assert_eq!(recover_and_format(&[0u8; 10], B256::ZERO.as_slice(), Address::ZERO), None);
/// ```
pub fn recover_and_format(signature: &[u8], message_hash: &[u8], expected: Address) -> Option<String> {
    if signature.len() != 64 || message_hash.len() != 32 {
        debug!(
            signature_len = signature.len(),
            hash_len = message_hash.len(),
            "Unexpected signature shape"
        );
        return None;
    }

    let hash = B256::from_slice(message_hash);
    let r = U256::from_be_slice(&signature[..32]);
    let s = U256::from_be_slice(&signature[32..]);

    for suffix in RECOVERY_SUFFIXES {
        let candidate = Signature::new(r, s, suffix == 0x1c);
        match candidate.recover_address_from_prehash(&hash) {
            Ok(address) if address == expected => {
                let mut full = [0u8; 65];
                full[..64].copy_from_slice(signature);
                full[64] = suffix;
                return Some(format!("0x{}", hex::encode(full)));
            }
            Ok(address) => trace!(suffix, %address, "Recovered a different address"),
            Err(e) => trace!(suffix, error = %e, "Recovery failed"),
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;
    use k256::ecdsa::SigningKey;
    use pretty_assertions::assert_eq;

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[1u8; 32]).unwrap()
    }

    #[test]
    fn test_address_from_public_key_formats() {
        let key = signing_key();
        let expected = Address::from_private_key(&key);
        let verifying = key.verifying_key();

        let compressed = verifying.to_encoded_point(true);
        let uncompressed = verifying.to_encoded_point(false);

        assert_eq!(address_from_public_key(compressed.as_bytes()), Some(expected));
        assert_eq!(address_from_public_key(uncompressed.as_bytes()), Some(expected));
        assert_eq!(address_from_public_key(&uncompressed.as_bytes()[1..]), Some(expected));
    }

    #[test]
    fn test_address_from_invalid_key() {
        assert_eq!(address_from_public_key(&[]), None);
        assert_eq!(address_from_public_key(&[0x05; 33]), None);
    }

    #[test]
    fn test_recovers_both_parities() {
        let key = signing_key();
        let address = Address::from_private_key(&key);
        let mut seen = [false; 2];

        for i in 0u8..32 {
            let hash = keccak256([i]);
            let (signature, recovery_id) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
            let bytes = signature.to_bytes();

            let formatted = recover_and_format(&bytes, hash.as_slice(), address).unwrap();
            let suffix = 0x1b + recovery_id.is_y_odd() as u8;
            assert_eq!(formatted, format!("0x{}{:02x}", hex::encode(bytes), suffix));

            seen[recovery_id.is_y_odd() as usize] = true;
        }

        assert_eq!(seen, [true, true]);
    }

    #[test]
    fn test_wrong_address_is_unresolved() {
        let key = signing_key();
        let hash = keccak256(b"hello");
        let (signature, _) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();

        let other = Address::from_private_key(&SigningKey::from_slice(&[2u8; 32]).unwrap());
        assert_eq!(recover_and_format(&signature.to_bytes(), hash.as_slice(), other), None);
    }

    #[test]
    fn test_wrong_hash_is_unresolved() {
        let key = signing_key();
        let address = Address::from_private_key(&key);
        let (signature, _) = key.sign_prehash_recoverable(keccak256(b"a").as_slice()).unwrap();

        assert_eq!(recover_and_format(&signature.to_bytes(), keccak256(b"b").as_slice(), address), None);
    }
}
