//! High-level error types

use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] oskey_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] oskey_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] oskey_types::Error),

    #[error("Device not connected")]
    NotConnected,

    #[error("Firmware {current} is older than the required {minimum}")]
    VersionIncompatible { current: String, minimum: String },

    #[error("Device storage is not initialized")]
    StorageInitFailed,

    #[error("Device is locked")]
    Locked,

    #[error("No signature received within {}s", .0.as_secs())]
    SignTimeout(Duration),

    #[error("Signature request cancelled")]
    SignCancelled,

    #[error("Peer error: {0}")]
    Peer(String),
}

impl Error {
    /// Check if the operation may succeed when retried on the same connection
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Core(e) => e.is_user_input(),
            Self::Types(_) | Self::Locked | Self::SignTimeout(_) | Self::SignCancelled | Self::Peer(_) => true,
            _ => false,
        }
    }

    /// Check if error requires reconnection
    pub fn requires_reconnect(&self) -> bool {
        match self {
            Self::Transport(e) => e.requires_reconnect(),
            Self::NotConnected => true,
            _ => false,
        }
    }
}
