//! Type definitions for oskey

pub mod device_info;
pub mod error;
pub mod mask;
pub mod peer;

pub use device_info::DeviceInfo;
pub use error::{Error, Result};
pub use mask::{FeatureMask, Features, Status, StatusMask, MASK_LEN};
pub use peer::{ChainId, Namespace, PeerMetadata, PeerSession};
