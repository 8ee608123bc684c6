//! Stream reassembly
//!
//! Serial reads arrive in chunks of arbitrary size. The [`Reassembler`] buffers
//! them and hands back complete frame payloads in the order their bytes arrived.

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::frame::{self, Decoded};

/// Incremental frame extractor over a byte stream
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: BytesMut,
    resyncs: u64,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            resyncs: 0,
        }
    }

    /// Append a chunk and drain every frame that is now complete
    ///
    /// # Examples
    ///
    /// ```
    /// use oskey_core::{frame, Reassembler};
    ///
    /// let encoded = frame::encode(b"ping").unwrap();
    /// let mut reassembler = Reassembler::new();
    ///
    /// assert!(reassembler.feed(&encoded[..6]).is_empty());
    /// let frames = reassembler.feed(&encoded[6..]);
    /// assert_eq!(frames.len(), 1);
    /// assert_eq!(&frames[0][..], b"ping");
    /// ```
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            match frame::try_decode_one(&self.buf) {
                Decoded::Incomplete => break,
                Decoded::Resync => {
                    trace!(byte = self.buf[0], "Resync: dropping one byte");
                    self.buf.advance(1);
                    self.resyncs += 1;
                }
                Decoded::Frame { payload, consumed } => {
                    let start = consumed - payload.len();
                    let mut whole = self.buf.split_to(consumed);
                    whole.advance(start);
                    frames.push(whole.freeze());
                }
            }
        }

        if !frames.is_empty() {
            trace!(frames = frames.len(), buffered = self.buf.len(), "Reassembled frames");
        }

        frames
    }

    /// Drop everything buffered
    pub fn reset(&mut self) {
        if !self.buf.is_empty() {
            debug!(discarded = self.buf.len(), "Clearing receive buffer");
        }
        self.buf.clear();
    }

    /// Bytes waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Number of single-byte resync steps taken so far
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }
}
