//! Error types for oskey-core

/// Result type alias for oskey-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Payload does not fit in a single frame
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// Frame payload is not a valid application message
    #[error("Failed to decode message: {0}")]
    Decode(#[from] prost::DecodeError),

    /// PIN rejected by the strength rules
    #[error("Invalid PIN: {}", .0.join(", "))]
    InvalidPin(Vec<String>),

    /// PIN and its confirmation differ
    #[error("PINs do not match")]
    PinMismatch,

    /// Mnemonic rejected by the word rules
    #[error("Invalid mnemonic: {}", .0.join(", "))]
    InvalidMnemonic(Vec<String>),
}

impl Error {
    /// Check if the error was caused by user input and can be corrected by the user
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidPin(_) | Self::PinMismatch | Self::InvalidMnemonic(_)
        )
    }
}
