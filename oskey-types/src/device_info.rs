//! Device information structures

use std::fmt;

use crate::mask::FeatureMask;

/// Device information reported by a version response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Firmware version string (dot separated)
    pub firmware_version: String,

    /// Hardware capabilities
    pub features: FeatureMask,

    /// Whether a wallet seed is stored on the device
    pub initialized: bool,
}

impl DeviceInfo {
    pub fn new(firmware_version: impl Into<String>, features: FeatureMask, initialized: bool) -> Self {
        Self {
            firmware_version: firmware_version.into(),
            features,
            initialized,
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[FW: {}, initialized: {}, features: {}]",
            self.firmware_version, self.initialized, self.features
        )
    }
}
