//! Device session state
//!
//! Everything the host knows about the attached device lives in one
//! [`DeviceSession`], owned by the dispatcher. It is reset on every disconnect.

use alloy_primitives::Address;

use oskey_types::{DeviceInfo, FeatureMask, Features, StatusMask};

use crate::events::Prompt;

/// Connection phase of the device handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No port open
    #[default]
    Unconnected,

    /// Port open, waiting for the version response
    VersionChecking,

    /// Firmware too old or storage broken; the port has been closed
    Incompatible,

    /// Version accepted
    Operational,
}

/// Wallet state within [`Phase::Operational`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletState {
    Locked,
    UnlockedUninitialized,
    UnlockedInitialized,
}

/// Host-side view of the device
#[derive(Debug, Default)]
pub struct DeviceSession {
    phase: Phase,
    firmware_version: Option<String>,
    features: FeatureMask,
    status: Option<StatusMask>,
    initialized: bool,
    address: Option<Address>,
    mnemonic: Option<String>,
    prompt: Option<Prompt>,
    ready: bool,
}

impl DeviceSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Wallet state, once a status response has been seen
    pub fn wallet_state(&self) -> Option<WalletState> {
        if self.phase != Phase::Operational {
            return None;
        }
        let status = self.status?;

        Some(if status.is_locked() {
            WalletState::Locked
        } else if self.initialized {
            WalletState::UnlockedInitialized
        } else {
            WalletState::UnlockedUninitialized
        })
    }

    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware_version.as_deref()
    }

    pub fn features(&self) -> &FeatureMask {
        &self.features
    }

    pub fn supports(&self, features: Features) -> bool {
        self.features.supports(features)
    }

    pub fn status(&self) -> Option<&StatusMask> {
        self.status.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_locked(&self) -> bool {
        self.status.is_some_and(|s| s.is_locked())
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    /// Unlocked, initialized and serving peer requests
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Snapshot of the last version response
    pub fn info(&self) -> Option<DeviceInfo> {
        self.firmware_version
            .as_ref()
            .map(|version| DeviceInfo::new(version.clone(), self.features, self.initialized))
    }

    pub(crate) fn record_version(&mut self, version: &str, features: FeatureMask, initialized: bool) {
        self.firmware_version = Some(version.to_string());
        self.features = features;
        self.initialized = initialized;
    }

    pub(crate) fn record_status(&mut self, status: StatusMask) {
        self.status = Some(status);
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub(crate) fn set_address(&mut self, address: Address) {
        self.address = Some(address);
    }

    pub(crate) fn set_mnemonic(&mut self, mnemonic: String) {
        self.mnemonic = Some(mnemonic);
    }

    /// Hand out the generated mnemonic; it is forgotten afterwards
    pub fn take_mnemonic(&mut self) -> Option<String> {
        self.mnemonic.take()
    }

    pub(crate) fn set_prompt(&mut self, prompt: Prompt) {
        self.prompt = Some(prompt);
    }

    pub(crate) fn clear_prompt(&mut self) -> Option<Prompt> {
        self.prompt.take()
    }

    pub(crate) fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Forget everything learned from the device
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_session() {
        let session = DeviceSession::new();
        assert_eq!(session.phase(), Phase::Unconnected);
        assert_eq!(session.wallet_state(), None);
        assert_eq!(session.info(), None);
        assert!(!session.is_locked());
    }

    #[test]
    fn test_wallet_state() {
        let mut session = DeviceSession::new();
        session.set_phase(Phase::Operational);
        session.record_version("0.4.0", FeatureMask::default(), true);
        assert_eq!(session.wallet_state(), None);

        session.record_status(StatusMask::from_bytes(&[1, 1]));
        assert_eq!(session.wallet_state(), Some(WalletState::Locked));

        session.record_status(StatusMask::from_bytes(&[1, 0]));
        assert_eq!(session.wallet_state(), Some(WalletState::UnlockedInitialized));
    }

    #[test]
    fn test_mnemonic_taken_once() {
        let mut session = DeviceSession::new();
        session.set_mnemonic("word ".repeat(24).trim().to_string());
        assert!(session.take_mnemonic().is_some());
        assert_eq!(session.take_mnemonic(), None);
    }

    #[test]
    fn test_reset() {
        let mut session = DeviceSession::new();
        session.set_phase(Phase::Operational);
        session.set_address(Address::repeat_byte(0x11));
        session.set_prompt(Prompt::EnterPin);
        session.set_ready(true);

        session.reset();
        assert_eq!(session.phase(), Phase::Unconnected);
        assert_eq!(session.address(), None);
        assert_eq!(session.prompt(), None);
        assert!(!session.is_ready());
    }
}
