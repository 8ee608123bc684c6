//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serial transport not available on this host")]
    TransportUnavailable,

    #[error("No serial port selected")]
    PortNotSelected,

    #[error("Serial port is not writable")]
    NotWritable,

    #[error("Message too large: {size} bytes (max: {max} bytes)")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed while opening the port")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Core(#[from] oskey_core::Error),
}

impl Error {
    /// Check if error requires reconnection
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, Self::NotWritable | Self::ConnectionClosed | Self::Io(_))
    }
}
