//! Connect to a device over a native serial port and print its account
//!
//! ```text
//! OSKEY_PORT=/dev/ttyACM0 OSKEY_PIN=... cargo run --example connect_serial --features serial
//! ```

use std::sync::Arc;

use anyhow::Context;
use oskey::{Device, DeviceConfig, DeviceEvent, Prompt};
use oskey_transport::NativeSerialHost;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let host = match std::env::var("OSKEY_PORT") {
        Ok(path) => NativeSerialHost::with_path(path),
        Err(_) => NativeSerialHost::new(),
    };

    let device = Device::new(Arc::new(host), DeviceConfig::default());
    let mut events = device.events();

    device.connect().await.context("failed to open the device")?;

    while let Ok(event) = events.recv().await {
        match event {
            DeviceEvent::Prompt(Prompt::EnterPin) => {
                let pin = std::env::var("OSKEY_PIN").context("device is locked, set OSKEY_PIN")?;
                device.unlock(&pin).await?;
            }
            DeviceEvent::Prompt(prompt @ Prompt::UnlockOnDevice) => {
                println!("{}", prompt);
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                device.refresh_status().await?;
            }
            DeviceEvent::Prompt(prompt) => println!("{}", prompt),
            DeviceEvent::AddressChanged(address) => {
                if let Some(info) = device.info() {
                    println!("{}", info);
                }
                println!("Account: {}", address);
                break;
            }
            DeviceEvent::Connection(oskey::ConnectionState::Disconnected) => {
                anyhow::bail!("device disconnected");
            }
            _ => {}
        }
    }

    device.disconnect().await?;
    Ok(())
}
