//! Devices command implementation

use console::Style;

use crate::adb::bridge::AdbBridge;
use crate::adb::{Device, DeviceStatus};
use crate::error::Result;

/// Run the devices command
pub async fn run() -> Result<()> {
    let bridge = AdbBridge::locate();
    let devices = bridge.list_devices().await?;

    if devices.is_empty() {
        println!("No devices connected");
        return Ok(());
    }

    for device in &devices {
        print_device(device);
    }
    Ok(())
}

fn print_device(device: &Device) {
    let status = match device.status {
        DeviceStatus::Ready => Style::new().green().apply_to("ready"),
        DeviceStatus::Unauthorized => Style::new().yellow().apply_to("unauthorized"),
        DeviceStatus::Offline => Style::new().red().apply_to("offline"),
        DeviceStatus::Unknown => Style::new().dim().apply_to("unknown"),
    };

    let mut details = Vec::new();
    if let Some(model) = &device.model {
        details.push(model.clone());
    }
    if let Some(architecture) = &device.architecture {
        details.push(architecture.clone());
    }

    if details.is_empty() {
        println!(
            "{}  {status}",
            Style::new().bold().apply_to(&device.serial)
        );
    } else {
        println!(
            "{}  {status}  {}",
            Style::new().bold().apply_to(&device.serial),
            details.join(", ")
        );
    }
}
