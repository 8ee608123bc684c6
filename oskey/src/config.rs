//! Device configuration

use std::time::Duration;

use oskey_core::constants::{
    DEFAULT_DERIVATION_PATH, DEFAULT_MNEMONIC_LENGTH, DEFAULT_SETTLE_DELAY_MS, DEFAULT_SIGN_TIMEOUT,
    MINIMUM_FIRMWARE_VERSION,
};
use oskey_transport::PortConfig;

/// Settings for a [`Device`](crate::Device)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Oldest firmware accepted after the version handshake
    pub minimum_version: String,
    /// Account path used for the address and all signatures
    pub derivation_path: String,
    /// How long a signature request may stay unanswered
    pub sign_timeout: Duration,
    /// Pause between opening the port and the version request
    pub settle_delay: Duration,
    /// Words requested when the device generates a wallet
    pub mnemonic_length: u32,
    pub port: PortConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            minimum_version: MINIMUM_FIRMWARE_VERSION.to_string(),
            derivation_path: DEFAULT_DERIVATION_PATH.to_string(),
            sign_timeout: Duration::from_secs(DEFAULT_SIGN_TIMEOUT),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            mnemonic_length: DEFAULT_MNEMONIC_LENGTH,
            port: PortConfig::default(),
        }
    }
}

impl DeviceConfig {
    pub fn with_minimum_version(mut self, version: impl Into<String>) -> Self {
        self.minimum_version = version.into();
        self
    }

    pub fn with_derivation_path(mut self, path: impl Into<String>) -> Self {
        self.derivation_path = path.into();
        self
    }

    /// Set signature timeout
    pub fn with_sign_timeout(mut self, timeout: Duration) -> Self {
        self.sign_timeout = timeout;
        self
    }

    /// Set the delay before the first request (zero disables it)
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_mnemonic_length(mut self, words: u32) -> Self {
        self.mnemonic_length = words;
        self
    }

    pub fn with_port(mut self, port: PortConfig) -> Self {
        self.port = port;
        self
    }
}
