use std::time::Duration;

use anyhow::{Context, Result};
use serialport::{ClearBuffer, SerialPort, SerialPortType};

use crate::settings::SerialSettings;

use super::link::DeviceLink;

pub type SerialLink = DeviceLink<Box<dyn SerialPort>>;

/// Opens the configured port with a per-read timeout and drops any bytes the
/// device sent before we were listening.
pub fn open(settings: &SerialSettings) -> Result<SerialLink> {
    log::info!(
        "Connecting to {} at {} baud...",
        settings.port,
        settings.baud_rate
    );

    let port = serialport::new(&settings.port, settings.baud_rate)
        .timeout(Duration::from_millis(settings.read_timeout_ms))
        .open()
        .with_context(|| format!("failed to open serial port {}", settings.port))?;

    port.clear(ClearBuffer::Input)
        .with_context(|| format!("failed to clear input buffer on {}", settings.port))?;

    Ok(DeviceLink::new(port))
}

#[derive(Debug, Clone)]
pub struct PortListing {
    pub name: String,
    pub description: String,
}

pub fn available_ports() -> Result<Vec<PortListing>> {
    let ports = serialport::available_ports().context("failed to enumerate serial ports")?;

    Ok(ports
        .into_iter()
        .map(|info| PortListing {
            description: describe(&info.port_type),
            name: info.port_name,
        })
        .collect())
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            match usb.manufacturer.as_deref() {
                Some(manufacturer) => format!(
                    "{product} ({manufacturer}) [{:04x}:{:04x}]",
                    usb.vid, usb.pid
                ),
                None => format!("{product} [{:04x}:{:04x}]", usb.vid, usb.pid),
            }
        }
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::Unknown => "unknown".to_string(),
    }
}
