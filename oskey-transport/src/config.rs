//! Serial port configuration

use oskey_core::constants::serial;

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Line settings used when opening a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    /// Size of the buffer handed to each read
    pub read_buffer: usize,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            baud_rate: serial::BAUD_RATE,
            data_bits: serial::DATA_BITS,
            stop_bits: serial::STOP_BITS,
            parity: Parity::None,
            read_buffer: 1024,
        }
    }
}

impl PortConfig {
    /// Set baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set read buffer size (at least one byte)
    pub fn with_read_buffer(mut self, size: usize) -> Self {
        self.read_buffer = size.max(1);
        self
    }
}
