//! Device feature and status masks
//!
//! The device reports both masks as 16-byte vectors where each position holds
//! `1` when the named property is present and `0` otherwise.
//!
//! ```text
//! feature mask            status mask
//! [0] secure boot         [0] storage initialized
//! [1] flash encryption    [1] locked
//! [2] bootloader
//! [3] storage
//! [4] hardware RNG
//! [5] display & input
//! [6] user key
//! ```

use std::fmt;

use bitflags::bitflags;

/// Length of the raw mask vectors
pub const MASK_LEN: usize = 16;

bitflags! {
    /// Hardware capabilities decoded from a [`FeatureMask`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features: u16 {
        const SECURE_BOOT = 1 << 0;
        const FLASH_ENCRYPTION = 1 << 1;
        const BOOTLOADER = 1 << 2;
        const STORAGE = 1 << 3;
        const HARDWARE_RNG = 1 << 4;
        const DISPLAY_INPUT = 1 << 5;
        const USER_KEY = 1 << 6;
    }
}

bitflags! {
    /// Runtime state decoded from a [`StatusMask`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u16 {
        const STORAGE_INITIALIZED = 1 << 0;
        const LOCKED = 1 << 1;
    }
}

fn copy_mask(bytes: &[u8]) -> [u8; MASK_LEN] {
    let mut raw = [0u8; MASK_LEN];
    let n = bytes.len().min(MASK_LEN);
    raw[..n].copy_from_slice(&bytes[..n]);
    raw
}

fn mask_bits(raw: &[u8; MASK_LEN]) -> u16 {
    raw.iter()
        .enumerate()
        .filter(|(_, v)| **v == 1)
        .fold(0u16, |bits, (i, _)| bits | (1 << i))
}

/// Device capability vector, fixed for the lifetime of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureMask([u8; MASK_LEN]);

impl FeatureMask {
    /// Build from the raw bytes of a version response.
    ///
    /// Shorter input is zero padded, bytes past [`MASK_LEN`] are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(copy_mask(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; MASK_LEN] {
        &self.0
    }

    /// Named capabilities present in the mask (unnamed positions are dropped)
    pub fn features(&self) -> Features {
        Features::from_bits_truncate(mask_bits(&self.0))
    }

    pub fn supports(&self, features: Features) -> bool {
        self.features().contains(features)
    }
}

impl fmt::Display for FeatureMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let features = self.features();
        if features.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = features.iter_names().map(|(name, _)| name).collect();
        f.write_str(&names.join("|"))
    }
}

/// Device runtime state vector, replaced wholesale on every status response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusMask([u8; MASK_LEN]);

impl StatusMask {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(copy_mask(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; MASK_LEN] {
        &self.0
    }

    pub fn status(&self) -> Status {
        Status::from_bits_truncate(mask_bits(&self.0))
    }

    pub fn storage_initialized(&self) -> bool {
        self.status().contains(Status::STORAGE_INITIALIZED)
    }

    pub fn is_locked(&self) -> bool {
        self.status().contains(Status::LOCKED)
    }
}
