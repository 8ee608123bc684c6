//! Wire frame encoding/decoding
//!
//! # Frame Structure
//!
//! ```text
//! ┌─────────────┬─────────────┬─────────────┐
//! │    Magic    │   Length    │   Payload   │
//! │   3 bytes   │   2 bytes   │   N bytes   │
//! │  E2 82 BF   │  (BE u16)   │   (bytes)   │
//! └─────────────┴─────────────┴─────────────┘
//! ```
//!
//! There is no checksum. A decoder that finds anything other than the magic at
//! the start of its buffer asks the caller to drop one byte and try again.

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use tracing::trace;

use crate::{
    constants::{HEADER_LENGTH, MAGIC, MAX_PAYLOAD},
    error::{Error, Result},
};

/// Outcome of a single decode attempt at the start of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// A complete frame; `consumed` counts header and payload bytes
    Frame { payload: &'a [u8], consumed: usize },

    /// More bytes are needed before anything can be decided
    Incomplete,

    /// No frame starts at offset 0; drop exactly one byte and retry
    Resync,
}

/// Encode a payload into a frame
///
/// # Errors
///
/// Returns [`Error::PayloadTooLarge`] if the payload exceeds [`MAX_PAYLOAD`].
///
/// # Examples
///
/// ```
/// use oskey_core::frame;
///
/// let encoded = frame::encode(&[0xAA, 0xBB]).unwrap();
/// assert_eq!(&encoded[..], &[0xE2, 0x82, 0xBF, 0x00, 0x02, 0xAA, 0xBB]);
/// ```
pub fn encode(payload: &[u8]) -> Result<BytesMut> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let mut buf = BytesMut::with_capacity(HEADER_LENGTH + payload.len());
    buf.put_slice(&MAGIC);
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);

    trace!(payload_len = payload.len(), "Encoded frame");

    Ok(buf)
}

/// Try to decode one frame from the start of `buf`
///
/// # Examples
///
/// ```
/// use oskey_core::frame::{self, Decoded};
///
/// let encoded = frame::encode(b"hi").unwrap();
/// assert_eq!(
///     frame::try_decode_one(&encoded),
///     Decoded::Frame { payload: b"hi", consumed: 7 },
/// );
/// assert_eq!(frame::try_decode_one(&encoded[..4]), Decoded::Incomplete);
/// assert_eq!(frame::try_decode_one(&[0x00; 8]), Decoded::Resync);
/// ```
pub fn try_decode_one(buf: &[u8]) -> Decoded<'_> {
    if buf.len() < HEADER_LENGTH {
        return Decoded::Incomplete;
    }

    if buf[..MAGIC.len()] != MAGIC {
        return Decoded::Resync;
    }

    let length = BigEndian::read_u16(&buf[MAGIC.len()..HEADER_LENGTH]) as usize;

    // A sender never produces this, so the magic was a coincidence
    if length > MAX_PAYLOAD {
        trace!(length, "Declared length exceeds maximum");
        return Decoded::Resync;
    }

    let total = HEADER_LENGTH + length;
    if buf.len() < total {
        return Decoded::Incomplete;
    }

    Decoded::Frame {
        payload: &buf[HEADER_LENGTH..total],
        consumed: total,
    }
}

/// Total encoded size of a payload of `payload_len` bytes
pub const fn encoded_len(payload_len: usize) -> usize {
    HEADER_LENGTH + payload_len
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_encode_header() {
        let encoded = encode(&[1, 2, 3]).unwrap();
        assert_eq!(&encoded[..3], &MAGIC);
        assert_eq!(&encoded[3..5], &[0x00, 0x03]);
        assert_eq!(&encoded[5..], &[1, 2, 3]);
    }

    #[test]
    fn test_encode_empty() {
        let encoded = encode(&[]).unwrap();
        assert_eq!(encoded.len(), HEADER_LENGTH);
        assert_eq!(
            try_decode_one(&encoded),
            Decoded::Frame { payload: &[], consumed: HEADER_LENGTH }
        );
    }

    #[test]
    fn test_encode_max_payload() {
        let payload = vec![0xAB; MAX_PAYLOAD];
        let encoded = encode(&payload).unwrap();
        assert_eq!(encoded.len(), encoded_len(MAX_PAYLOAD));
        assert_eq!(&encoded[3..5], &[0x30, 0x07]);
    }

    #[test]
    fn test_encode_too_large() {
        let payload = vec![0; MAX_PAYLOAD + 1];
        let result = encode(&payload);
        assert!(matches!(
            result,
            Err(Error::PayloadTooLarge { size, max }) if size == MAX_PAYLOAD + 1 && max == MAX_PAYLOAD
        ));
    }

    #[test]
    fn test_decode_short_header() {
        assert_eq!(try_decode_one(&[]), Decoded::Incomplete);
        assert_eq!(try_decode_one(&[0xE2, 0x82, 0xBF, 0x00]), Decoded::Incomplete);
        // Garbage shorter than a header is still just incomplete
        assert_eq!(try_decode_one(&[0x00, 0x01]), Decoded::Incomplete);
    }

    #[test]
    fn test_decode_partial_payload() {
        let encoded = encode(&[9; 10]).unwrap();
        assert_eq!(try_decode_one(&encoded[..HEADER_LENGTH + 9]), Decoded::Incomplete);
    }

    #[test]
    fn test_decode_bad_magic() {
        assert_eq!(try_decode_one(&[0xE2, 0x82, 0xBE, 0x00, 0x00]), Decoded::Resync);
        assert_eq!(try_decode_one(&[0x00, 0xE2, 0x82, 0xBF, 0x00, 0x00]), Decoded::Resync);
    }

    #[test]
    fn test_decode_oversized_length() {
        let buf = [0xE2, 0x82, 0xBF, 0xFF, 0xFF];
        assert_eq!(try_decode_one(&buf), Decoded::Resync);
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut buf = encode(b"abc").unwrap();
        buf.extend_from_slice(&[0xE2, 0x82]);
        assert_eq!(
            try_decode_one(&buf),
            Decoded::Frame { payload: b"abc", consumed: 8 }
        );
    }

    proptest! {
        #[test]
        fn prop_roundtrip(payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD)) {
            let encoded = encode(&payload).unwrap();
            prop_assert_eq!(encoded.len(), HEADER_LENGTH + payload.len());
            match try_decode_one(&encoded) {
                Decoded::Frame { payload: decoded, consumed } => {
                    prop_assert_eq!(decoded, payload.as_slice());
                    prop_assert_eq!(consumed, encoded.len());
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
