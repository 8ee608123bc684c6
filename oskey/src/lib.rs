//! # oskey
//!
//! Host-side client for the OSKey hardware wallet.
//!
//! ## Features
//!
//! - Framed serial protocol with stream resynchronization
//! - Async/await API using Tokio
//! - Handshake, unlock and wallet setup driven by a device state machine
//! - Message and transaction signing with recovery id resolution
//! - Bridge for dApp peer sessions
//!
//! ## Quick Start
//!
//! ```no_run
//! # #[cfg(feature = "serial")]
//! # async fn run() -> oskey::Result<()> {
//! use std::sync::Arc;
//! use oskey::{Device, DeviceConfig, DeviceEvent, Prompt};
//! use oskey_transport::NativeSerialHost;
//!
//! let device = Device::new(Arc::new(NativeSerialHost::new()), DeviceConfig::default());
//! let mut events = device.events();
//! device.connect().await?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         DeviceEvent::Prompt(Prompt::EnterPin) => device.unlock("my secret pin").await?,
//!         DeviceEvent::AddressChanged(address) => {
//!             println!("Account: {}", address);
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//!
//! device.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod peer;
pub mod pending;
pub mod session;
pub mod signature;

// Re-exports
pub use config::DeviceConfig;
pub use device::{Device, WalletSigner};
pub use dispatcher::{Action, Dispatcher};
pub use error::{Error, Result};
pub use events::{DeviceEvent, Prompt};
pub use peer::{ChainProvider, Confirmer, PeerBridge, PeerClient, PeerRequest, PeerResponse, PeerRpcError};
pub use session::{DeviceSession, Phase, WalletState};

// Re-export types
pub use oskey_core::message::Eip2930;
pub use oskey_transport::{ConnectionState, PortConfig, SerialHost, SerialPort, TransportSession};
pub use oskey_types::{ChainId, DeviceInfo, FeatureMask, Features, PeerSession, StatusMask};
