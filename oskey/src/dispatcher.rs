//! Device state machine
//!
//! The [`Dispatcher`] turns each response from the device into a list of
//! [`Action`]s for its owner to execute. It performs no I/O itself.
//!
//! ```text
//!   Unconnected ──begin()──▶ VersionChecking ──version ok──▶ Operational
//!                                   │                            │
//!                              too old                   status response
//!                                   ▼                            ▼
//!                             Incompatible          Locked / Unlocked{Uninit,Init}
//! ```

use tracing::{debug, info, warn};

use oskey_core::constants::{FIRMWARE_RELEASES_URL, FLASH_TOOL_URL};
use oskey_core::message::{
    res_data::Payload, DerivePublicKeyResponse, InitWalletResponse, SignResponse, StatusResponse,
    VersionResponse,
};
use oskey_core::{pin, version, ReqData, ResData};
use oskey_types::{FeatureMask, Features, StatusMask};

use crate::config::DeviceConfig;
use crate::events::{DeviceEvent, Prompt};
use crate::pending::SignRequests;
use crate::session::{DeviceSession, Phase};
use crate::signature::{address_from_public_key, recover_and_format};

/// Work requested by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write a request to the device
    Send(ReqData),
    /// Close the transport
    Close,
    /// Publish an event
    Emit(DeviceEvent),
}

/// Response handler driving a [`DeviceSession`]
#[derive(Debug)]
pub struct Dispatcher {
    session: DeviceSession,
    minimum_version: String,
    derivation_path: String,
    sign_requests: SignRequests,
}

impl Dispatcher {
    pub fn new(config: &DeviceConfig, sign_requests: SignRequests) -> Self {
        Self {
            session: DeviceSession::new(),
            minimum_version: config.minimum_version.clone(),
            derivation_path: config.derivation_path.clone(),
            sign_requests,
        }
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    /// Start the handshake on a freshly opened port
    pub fn begin(&mut self) -> Vec<Action> {
        self.session.reset();
        self.session.set_phase(Phase::VersionChecking);
        vec![Action::Send(ReqData::version())]
    }

    /// Port closed: forget the device
    ///
    /// A failed handshake keeps its phase and prompt until the next
    /// [`Dispatcher::begin`].
    pub fn disconnected(&mut self) -> Vec<Action> {
        if self.session.phase() == Phase::Incompatible {
            debug!("Keeping failed handshake state");
            return Vec::new();
        }

        let had_prompt = self.session.prompt().is_some_and(|p| !p.is_terminal());
        if self.session.phase() != Phase::Unconnected {
            debug!("Resetting device session");
        }
        self.session.reset();

        if had_prompt {
            vec![Action::Emit(DeviceEvent::PromptCleared)]
        } else {
            Vec::new()
        }
    }

    /// Unlock request for a PIN collected by the host
    pub fn unlock_request(&mut self, pin: &str) -> Vec<Action> {
        let mut actions = self.clear_prompt();
        actions.push(Action::Send(ReqData::unlock(pin::hash_pin(pin))));
        actions
    }

    /// Status request after the user unlocked on the device
    pub fn refresh_status(&mut self) -> Vec<Action> {
        let mut actions = match self.session.prompt() {
            Some(Prompt::UnlockOnDevice) => self.clear_prompt(),
            _ => Vec::new(),
        };
        actions.push(Action::Send(ReqData::status()));
        actions
    }

    /// Handle one response from the device
    pub fn handle(&mut self, message: ResData) -> Vec<Action> {
        let Some(payload) = message.payload else {
            warn!("Ignoring message of unknown kind");
            return Vec::new();
        };

        let mut actions = Vec::new();
        if !matches!(payload, Payload::WaitForUserActionResponse(_))
            && self.session.prompt() == Some(&Prompt::AwaitUserAction)
        {
            actions.extend(self.clear_prompt());
        }

        match payload {
            Payload::VersionResponse(res) => actions.extend(self.on_version(res)),
            Payload::StatusResponse(res) => actions.extend(self.on_status(res)),
            Payload::InitWalletResponse(res) => actions.extend(self.on_init_wallet(res)),
            Payload::DerivePublicKeyResponse(res) => actions.extend(self.on_public_key(res)),
            Payload::SignResponse(res) => self.on_sign(res),
            Payload::WaitForUserActionResponse(_) => {
                if self.session.prompt() != Some(&Prompt::AwaitUserAction) {
                    actions.extend(self.prompt(Prompt::AwaitUserAction));
                }
            }
        }

        actions
    }

    fn on_version(&mut self, res: VersionResponse) -> Vec<Action> {
        if !version::is_version_compatible(&res.version, &self.minimum_version) {
            warn!(current = %res.version, minimum = %self.minimum_version, "Firmware too old");
            self.session.set_phase(Phase::Incompatible);

            let mut actions = vec![Action::Close];
            actions.extend(self.prompt(Prompt::UpgradeFirmware {
                current: res.version,
                minimum: self.minimum_version.clone(),
                url: FIRMWARE_RELEASES_URL.to_string(),
            }));
            return actions;
        }

        let (initialized, features) = match &res.features {
            Some(f) => (f.initialized, FeatureMask::from_bytes(&f.support_mask)),
            None => (false, FeatureMask::default()),
        };

        info!(version = %res.version, %features, initialized, "Device identified");
        self.session.record_version(&res.version, features, initialized);
        self.session.set_phase(Phase::Operational);

        vec![Action::Send(ReqData::status())]
    }

    fn on_status(&mut self, res: StatusResponse) -> Vec<Action> {
        if self.session.phase() != Phase::Operational {
            debug!(phase = ?self.session.phase(), "Status response before version handshake");
            return Vec::new();
        }

        let status = StatusMask::from_bytes(&res.status_mask);
        self.session.record_status(status);
        debug!(status = ?status.status(), "Device status");

        if self.session.supports(Features::STORAGE) && !status.storage_initialized() {
            warn!("Device storage failed to initialize");
            self.session.set_phase(Phase::Incompatible);
            let mut actions = vec![Action::Close];
            actions.extend(self.prompt(Prompt::StorageInitFailed {
                url: FLASH_TOOL_URL.to_string(),
            }));
            return actions;
        }

        if !self.session.is_initialized() {
            debug!("Wallet not initialized yet");
            return Vec::new();
        }

        if status.is_locked() {
            let prompt = if self.session.supports(Features::DISPLAY_INPUT) {
                Prompt::UnlockOnDevice
            } else {
                Prompt::EnterPin
            };
            return self.prompt(prompt);
        }

        let mut actions = match self.session.prompt() {
            Some(Prompt::EnterPin | Prompt::UnlockOnDevice) => self.clear_prompt(),
            _ => Vec::new(),
        };
        actions.extend(self.unlocked());
        actions
    }

    fn on_init_wallet(&mut self, res: InitWalletResponse) -> Vec<Action> {
        info!("Wallet initialized");
        self.session.mark_initialized();

        let mut actions = vec![Action::Emit(DeviceEvent::Initialized)];
        if !res.mnemonic.is_empty() {
            self.session.set_mnemonic(res.mnemonic);
            actions.push(Action::Emit(DeviceEvent::MnemonicReady));
        }
        actions.extend(self.unlocked());
        actions
    }

    fn on_public_key(&mut self, res: DerivePublicKeyResponse) -> Vec<Action> {
        match address_from_public_key(&res.public_key) {
            Some(address) => {
                info!(%address, "Account address");
                self.session.set_address(address);
                vec![Action::Emit(DeviceEvent::AddressChanged(address.to_checksum(None)))]
            }
            None => {
                warn!(len = res.public_key.len(), "Device returned an unusable public key");
                Vec::new()
            }
        }
    }

    fn on_sign(&mut self, res: SignResponse) {
        let expected = address_from_public_key(&res.public_key).or(self.session.address());
        let Some(expected) = expected else {
            warn!(id = res.id, "Signature received without a known account");
            return;
        };

        match recover_and_format(&res.signature, &res.pre_hash, expected) {
            Some(signature) => {
                if !self.sign_requests.resolve(res.id, signature) {
                    debug!(id = res.id, "Signature arrived after its request ended");
                }
            }
            None => warn!(id = res.id, "Signature does not recover to the account address"),
        }
    }

    /// Device unlocked and initialized: fetch the account and accept peer requests
    fn unlocked(&mut self) -> Vec<Action> {
        let mut actions = vec![Action::Send(ReqData::derive_public_key(self.derivation_path.clone()))];
        if !self.session.is_ready() {
            self.session.set_ready(true);
            actions.push(Action::Emit(DeviceEvent::Ready));
        }
        actions
    }

    fn prompt(&mut self, prompt: Prompt) -> Vec<Action> {
        self.session.set_prompt(prompt.clone());
        vec![Action::Emit(DeviceEvent::Prompt(prompt))]
    }

    fn clear_prompt(&mut self) -> Vec<Action> {
        match self.session.clear_prompt() {
            Some(_) => vec![Action::Emit(DeviceEvent::PromptCleared)],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{keccak256, Address};
    use k256::ecdsa::SigningKey;
    use oskey_core::message::{DeviceFeatures, WaitForUserActionResponse};
    use pretty_assertions::assert_eq;

    use crate::session::WalletState;

    const STORAGE: usize = 3;
    const DISPLAY_INPUT: usize = 5;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(&DeviceConfig::default(), SignRequests::new())
    }

    fn response(payload: Payload) -> ResData {
        ResData { payload: Some(payload) }
    }

    fn version(v: &str, initialized: bool, features: &[usize]) -> ResData {
        let mut mask = vec![0u8; 16];
        for &i in features {
            mask[i] = 1;
        }
        response(Payload::VersionResponse(VersionResponse {
            version: v.into(),
            features: Some(DeviceFeatures {
                initialized,
                support_mask: mask,
            }),
        }))
    }

    fn status(storage_initialized: bool, locked: bool) -> ResData {
        response(Payload::StatusResponse(StatusResponse {
            status_mask: vec![storage_initialized as u8, locked as u8],
        }))
    }

    fn sends(actions: &[Action]) -> Vec<&'static str> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(req) => Some(req.kind()),
                _ => None,
            })
            .collect()
    }

    fn signing_key() -> SigningKey {
        SigningKey::from_slice(&[7u8; 32]).unwrap()
    }

    #[test]
    fn test_begin_requests_version() {
        let mut d = dispatcher();
        assert_eq!(d.begin(), vec![Action::Send(ReqData::version())]);
        assert_eq!(d.session().phase(), Phase::VersionChecking);
    }

    #[test]
    fn test_old_firmware_closes() {
        let mut d = dispatcher();
        d.begin();

        let actions = d.handle(version("0.3.9", true, &[]));
        assert_eq!(
            actions,
            vec![
                Action::Close,
                Action::Emit(DeviceEvent::Prompt(Prompt::UpgradeFirmware {
                    current: "0.3.9".into(),
                    minimum: "0.4.0".into(),
                    url: FIRMWARE_RELEASES_URL.into(),
                })),
            ]
        );
        assert_eq!(d.session().phase(), Phase::Incompatible);
        assert_eq!(d.session().info(), None);
    }

    #[test]
    fn test_compatible_version_requests_status() {
        let mut d = dispatcher();
        d.begin();

        let actions = d.handle(version("0.4.0", true, &[STORAGE]));
        assert_eq!(actions, vec![Action::Send(ReqData::status())]);
        assert_eq!(d.session().phase(), Phase::Operational);
        assert!(d.session().supports(Features::STORAGE));

        let info = d.session().info().unwrap();
        assert_eq!(info.firmware_version, "0.4.0");
        assert!(info.initialized);
    }

    #[test]
    fn test_missing_features_default_to_empty() {
        let mut d = dispatcher();
        d.begin();
        d.handle(response(Payload::VersionResponse(VersionResponse {
            version: "1.0.0".into(),
            features: None,
        })));

        assert!(!d.session().is_initialized());
        assert_eq!(d.session().features(), &FeatureMask::default());
    }

    #[test]
    fn test_storage_init_failure_closes() {
        let mut d = dispatcher();
        d.begin();
        d.handle(version("0.4.0", true, &[STORAGE]));

        let actions = d.handle(status(false, false));
        assert_eq!(
            actions,
            vec![
                Action::Close,
                Action::Emit(DeviceEvent::Prompt(Prompt::StorageInitFailed {
                    url: FLASH_TOOL_URL.into(),
                })),
            ]
        );
        assert!(sends(&actions).is_empty());
        assert_eq!(d.session().phase(), Phase::Incompatible);
    }

    #[test]
    fn test_failed_handshake_survives_disconnect() {
        let mut d = dispatcher();
        d.begin();
        d.handle(version("0.3.9", true, &[]));

        assert!(d.disconnected().is_empty());
        assert_eq!(d.session().phase(), Phase::Incompatible);
        assert!(matches!(d.session().prompt(), Some(Prompt::UpgradeFirmware { .. })));

        let mut d = dispatcher();
        d.begin();
        d.handle(version("0.4.0", true, &[STORAGE]));
        d.handle(status(false, false));

        assert!(d.disconnected().is_empty());
        assert_eq!(d.session().phase(), Phase::Incompatible);
        assert!(matches!(d.session().prompt(), Some(Prompt::StorageInitFailed { .. })));

        assert_eq!(d.begin(), vec![Action::Send(ReqData::version())]);
        assert_eq!(d.session().phase(), Phase::VersionChecking);
        assert_eq!(d.session().prompt(), None);
    }

    #[test]
    fn test_storage_check_skipped_without_support() {
        let mut d = dispatcher();
        d.begin();
        d.handle(version("0.4.0", true, &[]));

        let actions = d.handle(status(false, false));
        assert_eq!(sends(&actions), vec!["derive_public_key_request"]);
    }

    #[test]
    fn test_locked_without_display_asks_for_pin() {
        let mut d = dispatcher();
        d.begin();
        d.handle(version("0.4.0", true, &[STORAGE]));

        let actions = d.handle(status(true, true));
        assert_eq!(actions, vec![Action::Emit(DeviceEvent::Prompt(Prompt::EnterPin))]);
        assert_eq!(d.session().wallet_state(), Some(WalletState::Locked));

        let actions = d.unlock_request("Abcdefg1");
        assert_eq!(
            actions,
            vec![
                Action::Emit(DeviceEvent::PromptCleared),
                Action::Send(ReqData::unlock(pin::hash_pin("Abcdefg1"))),
            ]
        );
    }

    #[test]
    fn test_locked_with_display_unlocks_on_device() {
        let mut d = dispatcher();
        d.begin();
        d.handle(version("0.4.0", true, &[STORAGE, DISPLAY_INPUT]));

        let actions = d.handle(status(true, true));
        assert_eq!(actions, vec![Action::Emit(DeviceEvent::Prompt(Prompt::UnlockOnDevice))]);

        let actions = d.refresh_status();
        assert_eq!(
            actions,
            vec![
                Action::Emit(DeviceEvent::PromptCleared),
                Action::Send(ReqData::status()),
            ]
        );
    }

    #[test]
    fn test_unlocked_derives_key_and_arms() {
        let mut d = dispatcher();
        d.begin();
        d.handle(version("0.4.0", true, &[STORAGE]));

        let actions = d.handle(status(true, false));
        assert_eq!(
            actions,
            vec![
                Action::Send(ReqData::derive_public_key("m/44'/60'/0'/0/0")),
                Action::Emit(DeviceEvent::Ready),
            ]
        );
        assert!(d.session().is_ready());

        // A second refresh does not re-arm
        let actions = d.handle(status(true, false));
        assert_eq!(sends(&actions), vec!["derive_public_key_request"]);
        assert!(!actions.contains(&Action::Emit(DeviceEvent::Ready)));
    }

    #[test]
    fn test_uninitialized_waits_for_wallet() {
        let mut d = dispatcher();
        d.begin();
        d.handle(version("0.4.0", false, &[STORAGE]));

        assert!(d.handle(status(true, false)).is_empty());
        assert_eq!(d.session().wallet_state(), Some(WalletState::UnlockedUninitialized));

        let actions = d.handle(response(Payload::InitWalletResponse(InitWalletResponse {
            mnemonic: "abandon ".repeat(23) + "art",
        })));
        assert_eq!(
            actions,
            vec![
                Action::Emit(DeviceEvent::Initialized),
                Action::Emit(DeviceEvent::MnemonicReady),
                Action::Send(ReqData::derive_public_key("m/44'/60'/0'/0/0")),
                Action::Emit(DeviceEvent::Ready),
            ]
        );
        assert!(d.session().is_initialized());
        assert!(d.session_mut().take_mnemonic().is_some());
        assert_eq!(d.session_mut().take_mnemonic(), None);
    }

    #[test]
    fn test_status_before_version_ignored() {
        let mut d = dispatcher();
        d.begin();
        assert!(d.handle(status(false, true)).is_empty());
        assert_eq!(d.session().status(), None);
    }

    #[test]
    fn test_public_key_sets_address() {
        let key = signing_key();
        let expected = Address::from_private_key(&key);
        let public_key = key.verifying_key().to_encoded_point(false);

        let mut d = dispatcher();
        let actions = d.handle(response(Payload::DerivePublicKeyResponse(DerivePublicKeyResponse {
            public_key: public_key.as_bytes().to_vec(),
        })));

        assert_eq!(actions, vec![Action::Emit(DeviceEvent::AddressChanged(expected.to_checksum(None)))]);
        assert_eq!(d.session().address(), Some(expected));
    }

    #[test]
    fn test_bad_public_key_ignored() {
        let mut d = dispatcher();
        let actions = d.handle(response(Payload::DerivePublicKeyResponse(DerivePublicKeyResponse {
            public_key: vec![1, 2, 3],
        })));
        assert!(actions.is_empty());
        assert_eq!(d.session().address(), None);
    }

    #[tokio::test]
    async fn test_sign_response_resolves_matching_waiter() {
        let key = signing_key();
        let requests = SignRequests::new();
        let mut d = Dispatcher::new(&DeviceConfig::default(), requests.clone());

        let (other_id, _other_rx) = requests.register();
        let (id, rx) = requests.register();

        let hash = keccak256(b"payload");
        let (signature, _) = key.sign_prehash_recoverable(hash.as_slice()).unwrap();
        let actions = d.handle(response(Payload::SignResponse(SignResponse {
            id,
            signature: signature.to_bytes().to_vec(),
            pre_hash: hash.to_vec(),
            public_key: key.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
        })));
        assert!(actions.is_empty());

        let formatted = rx.await.unwrap();
        assert!(formatted.starts_with(&format!("0x{}", hex::encode(signature.to_bytes()))));
        assert_eq!(formatted.len(), 2 + 130);
        assert_eq!(requests.pending(), 1);
        requests.cancel(other_id);
    }

    #[test]
    fn test_unresolved_signature_leaves_waiter() {
        let key = signing_key();
        let requests = SignRequests::new();
        let mut d = Dispatcher::new(&DeviceConfig::default(), requests.clone());
        let (id, _rx) = requests.register();

        let (signature, _) = key.sign_prehash_recoverable(keccak256(b"a").as_slice()).unwrap();
        d.handle(response(Payload::SignResponse(SignResponse {
            id,
            signature: signature.to_bytes().to_vec(),
            pre_hash: keccak256(b"b").to_vec(),
            public_key: key.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
        })));

        assert_eq!(requests.pending(), 1);
    }

    #[test]
    fn test_user_action_prompt_cleared_by_next_message() {
        let mut d = dispatcher();
        d.begin();
        d.handle(version("0.4.0", false, &[]));

        let wait = || response(Payload::WaitForUserActionResponse(WaitForUserActionResponse {}));
        assert_eq!(d.handle(wait()), vec![Action::Emit(DeviceEvent::Prompt(Prompt::AwaitUserAction))]);
        // Repeated notices keep the prompt without re-emitting
        assert!(d.handle(wait()).is_empty());

        let actions = d.handle(status(true, false));
        assert_eq!(actions, vec![Action::Emit(DeviceEvent::PromptCleared)]);
        assert_eq!(d.session().prompt(), None);
    }

    #[test]
    fn test_unknown_message_ignored() {
        let mut d = dispatcher();
        d.begin();
        assert!(d.handle(ResData::default()).is_empty());
        assert_eq!(d.session().phase(), Phase::VersionChecking);
    }

    #[test]
    fn test_disconnect_resets_session() {
        let mut d = dispatcher();
        d.begin();
        d.handle(version("0.4.0", true, &[STORAGE]));
        d.handle(status(true, true));

        assert_eq!(d.disconnected(), vec![Action::Emit(DeviceEvent::PromptCleared)]);
        assert_eq!(d.session().phase(), Phase::Unconnected);
        assert_eq!(d.session().status(), None);
        assert!(d.disconnected().is_empty());
    }
}
