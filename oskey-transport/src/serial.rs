//! Native serial ports

use std::io;

use async_trait::async_trait;
use tokio_serial::{DataBits, SerialPortBuilderExt, StopBits};
use tracing::{debug, info};

use crate::{
    config::{Parity, PortConfig},
    error::{Error, Result},
    SerialHost, SerialPort,
};

/// Serial host backed by the operating system's serial devices
#[derive(Debug, Clone, Default)]
pub struct NativeSerialHost {
    path: Option<String>,
}

impl NativeSerialHost {
    /// Use the first port the system reports
    pub fn new() -> Self {
        Self::default()
    }

    /// Always open `path` (e.g. `/dev/ttyACM0` or `COM3`)
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    fn select_port(&self) -> Result<String> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }

        let ports = tokio_serial::available_ports().map_err(io::Error::from)?;
        debug!(count = ports.len(), "Enumerated serial ports");

        ports
            .into_iter()
            .next()
            .map(|port| port.port_name)
            .ok_or(Error::PortNotSelected)
    }
}

fn data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

fn stop_bits(bits: u8) -> StopBits {
    if bits == 2 { StopBits::Two } else { StopBits::One }
}

fn parity(parity: Parity) -> tokio_serial::Parity {
    match parity {
        Parity::None => tokio_serial::Parity::None,
        Parity::Odd => tokio_serial::Parity::Odd,
        Parity::Even => tokio_serial::Parity::Even,
    }
}

#[async_trait]
impl SerialHost for NativeSerialHost {
    fn is_available(&self) -> bool {
        true
    }

    async fn request_port(&self, config: &PortConfig) -> Result<Box<dyn SerialPort>> {
        let path = self.select_port()?;

        let stream = tokio_serial::new(&path, config.baud_rate)
            .data_bits(data_bits(config.data_bits))
            .stop_bits(stop_bits(config.stop_bits))
            .parity(parity(config.parity))
            .open_native_async()
            .map_err(io::Error::from)?;

        info!(port = %path, baud_rate = config.baud_rate, "Opened serial port");

        Ok(Box::new(stream))
    }
}
