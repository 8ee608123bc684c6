//! Transport layer for the OSKey protocol
//!
//! Provides the serial transport session: port lifecycle, the read loop that
//! turns raw bytes into messages, and chunked frame writes.

pub mod config;
pub mod error;
pub mod session;
#[cfg(feature = "serial")]
pub mod serial;

pub use config::{Parity, PortConfig};
pub use error::{Error, Result};
pub use session::{ConnectionState, TransportSession};
#[cfg(feature = "serial")]
pub use serial::NativeSerialHost;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// An open, bidirectional serial port
pub trait SerialPort: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> SerialPort for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Host environment that grants access to serial ports
#[async_trait]
pub trait SerialHost: Send + Sync {
    /// Check if the host can open serial ports at all
    fn is_available(&self) -> bool;

    /// Ask for a port (user selection or permission grant) and open it
    async fn request_port(&self, config: &PortConfig) -> Result<Box<dyn SerialPort>>;
}
