//! High-level device interface

use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use oskey_core::message::Eip2930;
use oskey_core::{pin, validation, ReqData, ResData};
use oskey_transport::{ConnectionState, SerialHost, TransportSession};
use oskey_types::DeviceInfo;

use crate::config::DeviceConfig;
use crate::dispatcher::{Action, Dispatcher};
use crate::error::{Error, Result};
use crate::events::{DeviceEvent, Prompt};
use crate::pending::SignRequests;
use crate::session::{Phase, WalletState};

const EVENT_CAPACITY: usize = 64;

/// Inputs to the dispatcher, kept in arrival order
#[derive(Debug)]
enum Inbound {
    Message(ResData),
    State(ConnectionState),
    Begin,
}

/// Why the device closed the connection on its own
#[derive(Debug, Clone)]
enum Failure {
    Incompatible { current: String, minimum: String },
    StorageInit,
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        match failure {
            Failure::Incompatible { current, minimum } => Error::VersionIncompatible { current, minimum },
            Failure::StorageInit => Error::StorageInitFailed,
        }
    }
}

struct Shared {
    transport: TransportSession,
    dispatcher: Mutex<Dispatcher>,
    events: broadcast::Sender<DeviceEvent>,
    failure: Mutex<Option<Failure>>,
}

impl Shared {
    fn emit(&self, event: DeviceEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn execute(&self, actions: Vec<Action>) {
        // Failures must be visible before the port closes
        for action in &actions {
            if let Action::Emit(DeviceEvent::Prompt(prompt)) = action {
                self.record_failure(prompt);
            }
        }

        for action in actions {
            match action {
                Action::Send(request) => {
                    if let Err(e) = self.transport.send_request(&request).await {
                        warn!(kind = request.kind(), error = %e, "Failed to send request");
                    }
                }
                Action::Close => {
                    if let Err(e) = self.transport.close().await {
                        warn!(error = %e, "Failed to close transport");
                    }
                }
                Action::Emit(event) => self.emit(event),
            }
        }
    }

    fn record_failure(&self, prompt: &Prompt) {
        let failure = match prompt {
            Prompt::UpgradeFirmware { current, minimum, .. } => Failure::Incompatible {
                current: current.clone(),
                minimum: minimum.clone(),
            },
            Prompt::StorageInitFailed { .. } => Failure::StorageInit,
            _ => return,
        };
        *self.failure.lock() = Some(failure);
    }

    async fn pump(self: Arc<Self>, mut inbound: mpsc::UnboundedReceiver<Inbound>) {
        while let Some(input) = inbound.recv().await {
            let actions = {
                let mut dispatcher = self.dispatcher.lock();
                match input {
                    Inbound::Message(message) => dispatcher.handle(message),
                    Inbound::Begin => dispatcher.begin(),
                    Inbound::State(state) => {
                        self.emit(DeviceEvent::Connection(state));
                        if state == ConnectionState::Disconnected {
                            dispatcher.disconnected()
                        } else {
                            Vec::new()
                        }
                    }
                }
            };
            self.execute(actions).await;
        }
        debug!("Device event pump stopped");
    }
}

/// OSKey hardware wallet
///
/// Owns the serial transport and the device state machine. Responses are
/// processed in the background in the order they arrive; UI-facing changes
/// are published through [`Device::events`].
///
/// Must be created inside a Tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use oskey::{Device, DeviceConfig, DeviceEvent};
/// use oskey_transport::SerialHost;
///
/// # async fn run(host: Arc<dyn SerialHost>) -> oskey::Result<()> {
/// let device = Device::new(host, DeviceConfig::default());
/// let mut events = device.events();
///
/// device.connect().await?;
///
/// while let Ok(event) = events.recv().await {
///     if event == DeviceEvent::Ready {
///         let signature = device.sign_message("hello").await?;
///         println!("Signature: {}", signature);
///         break;
///     }
/// }
///
/// device.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct Device {
    shared: Arc<Shared>,
    inbound: mpsc::UnboundedSender<Inbound>,
    sign_requests: SignRequests,
    config: DeviceConfig,
    pump: JoinHandle<()>,
}

impl Device {
    /// Create a disconnected device on top of `host`
    pub fn new(host: Arc<dyn SerialHost>, config: DeviceConfig) -> Self {
        let transport = TransportSession::new(host, config.port.clone());
        let sign_requests = SignRequests::new();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();

        let messages = tx.clone();
        transport.on_message(move |message| {
            let _ = messages.send(Inbound::Message(message));
        });
        let states = tx.clone();
        transport.on_state(move |state| {
            let _ = states.send(Inbound::State(state));
        });

        let shared = Arc::new(Shared {
            transport,
            dispatcher: Mutex::new(Dispatcher::new(&config, sign_requests.clone())),
            events,
            failure: Mutex::new(None),
        });
        let pump = tokio::spawn(Arc::clone(&shared).pump(rx));

        Self {
            shared,
            inbound: tx,
            sign_requests,
            config,
            pump,
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Subscribe to device events
    pub fn events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.shared.events.subscribe()
    }

    /// Transport connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.transport.state()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.shared.transport.is_reading()
    }

    pub fn phase(&self) -> Phase {
        self.shared.dispatcher.lock().session().phase()
    }

    pub fn wallet_state(&self) -> Option<WalletState> {
        self.shared.dispatcher.lock().session().wallet_state()
    }

    /// Unlocked and initialized
    pub fn is_ready(&self) -> bool {
        self.shared.dispatcher.lock().session().is_ready()
    }

    /// Firmware and capability snapshot from the last handshake
    pub fn info(&self) -> Option<DeviceInfo> {
        self.shared.dispatcher.lock().session().info()
    }

    /// Account address for the configured derivation path
    pub fn address(&self) -> Option<Address> {
        self.shared.dispatcher.lock().session().address()
    }

    /// Pending prompt, if any
    pub fn prompt(&self) -> Option<Prompt> {
        self.shared.dispatcher.lock().session().prompt().cloned()
    }

    /// Take the mnemonic generated by [`Device::init_wallet`]
    ///
    /// Returns it once; later calls return `None`.
    pub fn take_mnemonic(&self) -> Option<String> {
        self.shared.dispatcher.lock().session_mut().take_mnemonic()
    }

    /// Connect to the device
    ///
    /// Opens the port, waits for the device to settle, then starts the version
    /// handshake. The outcome arrives as events.
    ///
    /// # Errors
    ///
    /// Returns error if the port cannot be opened.
    pub async fn connect(&self) -> Result<()> {
        info!("Connecting...");
        self.shared.failure.lock().take();
        self.shared.transport.connect().await?;

        if !self.config.settle_delay.is_zero() {
            sleep(self.config.settle_delay).await;
        }

        if !self.shared.transport.is_reading() {
            return Err(Error::NotConnected);
        }

        self.inbound.send(Inbound::Begin).map_err(|_| Error::NotConnected)?;
        info!("Connected");
        Ok(())
    }

    /// Disconnect from device
    ///
    /// Outstanding signature requests fail with [`Error::SignCancelled`].
    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting...");
        self.shared.transport.close().await?;
        self.sign_requests.cancel_all();
        Ok(())
    }

    /// Ask the device for its current status
    ///
    /// Used after the user unlocked on the device itself.
    pub async fn refresh_status(&self) -> Result<()> {
        self.check_operational()?;
        let actions = self.shared.dispatcher.lock().refresh_status();
        self.shared.execute(actions).await;
        Ok(())
    }

    /// Unlock with a PIN collected by the host
    pub async fn unlock(&self, pin: &str) -> Result<()> {
        self.check_operational()?;
        let actions = self.shared.dispatcher.lock().unlock_request(pin);
        self.shared.execute(actions).await;
        Ok(())
    }

    /// Generate a new wallet protected by `pin`
    ///
    /// The mnemonic becomes available through [`Device::take_mnemonic`] once
    /// [`DeviceEvent::MnemonicReady`] is published.
    ///
    /// # Errors
    ///
    /// Returns error if the PIN fails the strength rules or does not match
    /// `confirm`, or if the device is not connected.
    pub async fn init_wallet(&self, pin: &str, confirm: &str) -> Result<()> {
        validation::validate_new_pin(pin, confirm)?;
        self.check_operational()?;

        let request = ReqData::init_wallet(self.config.mnemonic_length, pin::hash_pin(pin));
        self.send(&request).await
    }

    /// Import an existing wallet from its mnemonic
    pub async fn import_wallet(&self, mnemonic: &str, pin: &str, confirm: &str) -> Result<()> {
        validation::validate_mnemonic(mnemonic)?;
        validation::validate_new_pin(pin, confirm)?;
        self.check_operational()?;

        let request = ReqData::init_wallet_custom(validation::normalize_mnemonic(mnemonic), pin::hash_pin(pin));
        self.send(&request).await
    }

    /// Request the public key for the configured derivation path
    pub async fn derive_public_key(&self) -> Result<()> {
        self.check_operational()?;
        self.send(&ReqData::derive_public_key(self.config.derivation_path.clone()))
            .await
    }

    /// Sign a personal message (EIP-191)
    ///
    /// Returns the 65-byte signature as `0x` hex.
    pub async fn sign_message(&self, message: &str) -> Result<String> {
        let path = self.config.derivation_path.clone();
        let message = message.to_string();
        self.sign(move |id| ReqData::sign_eip191(id, path, message)).await
    }

    /// Sign an access-list transaction (EIP-2930)
    pub async fn sign_transaction(&self, tx: Eip2930) -> Result<String> {
        let path = self.config.derivation_path.clone();
        self.sign(move |id| ReqData::sign_eip2930(id, path, tx)).await
    }

    async fn sign<F>(&self, build: F) -> Result<String>
    where
        F: FnOnce(u32) -> ReqData,
    {
        self.check_operational()?;
        if self.shared.dispatcher.lock().session().is_locked() {
            return Err(Error::Locked);
        }

        let (id, rx) = self.sign_requests.register();
        if let Err(e) = self.send(&build(id)).await {
            self.sign_requests.cancel(id);
            return Err(e);
        }
        debug!(id, "Waiting for signature");

        self.await_signature(id, rx).await
    }

    async fn await_signature(&self, id: u32, rx: oneshot::Receiver<String>) -> Result<String> {
        match timeout(self.config.sign_timeout, rx).await {
            Ok(Ok(signature)) => {
                info!(id, "Signature received");
                Ok(signature)
            }
            Ok(Err(_)) => Err(Error::SignCancelled),
            Err(_) => {
                self.sign_requests.cancel(id);
                warn!(id, "Signature timed out");
                Err(Error::SignTimeout(self.config.sign_timeout))
            }
        }
    }

    async fn send(&self, request: &ReqData) -> Result<()> {
        self.shared.transport.send_request(request).await?;
        Ok(())
    }

    fn check_operational(&self) -> Result<()> {
        if !self.shared.transport.is_reading() {
            return Err(match self.shared.failure.lock().clone() {
                Some(failure) => failure.into(),
                None => Error::NotConnected,
            });
        }

        match self.phase() {
            Phase::Operational => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shared.transport.abort();
        self.pump.abort();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("connection", &self.connection_state())
            .field("phase", &self.phase())
            .finish()
    }
}

/// Signing capability used by the peer bridge
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Current account address
    fn address(&self) -> Option<Address>;

    async fn sign_message(&self, message: &str) -> Result<String>;

    async fn sign_transaction(&self, tx: Eip2930) -> Result<String>;
}

#[async_trait]
impl WalletSigner for Device {
    fn address(&self) -> Option<Address> {
        Device::address(self)
    }

    async fn sign_message(&self, message: &str) -> Result<String> {
        Device::sign_message(self, message).await
    }

    async fn sign_transaction(&self, tx: Eip2930) -> Result<String> {
        Device::sign_transaction(self, tx).await
    }
}
