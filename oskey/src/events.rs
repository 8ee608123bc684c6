//! Events published to the UI layer

use std::fmt;

use oskey_core::version;
use oskey_transport::ConnectionState;

/// Something the user has to see or act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Firmware is older than the supported minimum
    UpgradeFirmware {
        current: String,
        minimum: String,
        url: String,
    },

    /// Storage exists but could not be initialized; the device needs reflashing
    StorageInitFailed { url: String },

    /// Device has no input of its own; the host must collect the PIN
    EnterPin,

    /// Unlock on the device, then refresh status
    UnlockOnDevice,

    /// Device is waiting for a confirmation on its own screen
    AwaitUserAction,
}

impl Prompt {
    /// Outcome of a failed handshake; stays up after the port closes
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::UpgradeFirmware { .. } | Self::StorageInitFailed { .. })
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpgradeFirmware { current, minimum, url } => {
                write!(f, "{} {}", version::upgrade_message(current, minimum), url)
            }
            Self::StorageInitFailed { url } => write!(
                f,
                "Storage initialization failed, please reflash the firmware: {}",
                url
            ),
            Self::EnterPin => f.write_str("Enter PIN to unlock"),
            Self::UnlockOnDevice => f.write_str("Unlock the device, then refresh"),
            Self::AwaitUserAction => f.write_str("Confirm on the device"),
        }
    }
}

/// Device event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// Transport state changed
    Connection(ConnectionState),

    Prompt(Prompt),

    /// The pending on-device prompt is gone
    PromptCleared,

    /// Wallet was created or imported
    Initialized,

    /// A freshly generated mnemonic is waiting in [`Device::take_mnemonic`](crate::Device::take_mnemonic)
    MnemonicReady,

    /// Account address derived from the device public key
    AddressChanged(String),

    /// Device is unlocked and initialized; peer requests may be served
    Ready,
}
