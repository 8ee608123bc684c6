//! Protocol constants

/// Frame start marker, the UTF-8 encoding of "₿"
pub const MAGIC: [u8; 3] = [0xE2, 0x82, 0xBF];

/// Size of the big-endian length field following the magic
pub const LENGTH_BYTES: usize = 2;

/// Frame header size (magic + length)
pub const HEADER_LENGTH: usize = MAGIC.len() + LENGTH_BYTES;

/// Largest payload the device accepts in one frame
pub const MAX_PAYLOAD: usize = 12288 + 7;

/// Bytes per write when pushing a frame to the port
pub const WRITE_CHUNK_SIZE: usize = 4;

/// Serial line settings (8N1)
pub mod serial {
    pub const BAUD_RATE: u32 = 115_200;
    pub const DATA_BITS: u8 = 8;
    pub const STOP_BITS: u8 = 1;
}

/// Salt appended to a PIN before hashing
pub const PIN_SALT: &str = "&%OSKey1$!@";

/// Minimum accepted PIN length (inclusive)
pub const MIN_PIN_LENGTH: usize = 8;

/// Minimum number of words in an imported mnemonic
pub const MIN_MNEMONIC_WORDS: usize = 12;

/// Mnemonic length requested when the device generates a wallet
pub const DEFAULT_MNEMONIC_LENGTH: u32 = 24;

/// Oldest firmware the host protocol supports
pub const MINIMUM_FIRMWARE_VERSION: &str = "0.4.0";

/// Default Ethereum account derivation path
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Default time a signature request may stay unanswered (seconds)
pub const DEFAULT_SIGN_TIMEOUT: u64 = 120;

/// Delay between opening the port and the first version query (milliseconds)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;

/// Gas limit used when a transaction request does not carry one
pub const DEFAULT_GAS_LIMIT: u64 = 21_000;

/// Where users fetch newer firmware
pub const FIRMWARE_RELEASES_URL: &str = "https://github.com/butterfly-community/oskey-firmware/releases";

/// Browser flashing tool offered when storage initialization fails
pub const FLASH_TOOL_URL: &str = "https://espressif.github.io/esptool-js/";
