//! Monitor command implementation

use std::time::Duration;

use console::Style;

use crate::adb::bridge::AdbBridge;
use crate::adb::monitor::{DEFAULT_POLL_INTERVAL, DeviceMonitor, MonitorSnapshot};
use crate::adb::DeviceStatus;
use crate::cli::MonitorArgs;
use crate::error::Result;

/// Run the monitor command: print device-list changes until interrupted
pub async fn run(args: MonitorArgs) -> Result<()> {
    let interval = match args.interval {
        0 => DEFAULT_POLL_INTERVAL,
        seconds => Duration::from_secs(seconds),
    };
    let bridge = AdbBridge::locate();
    let monitor = DeviceMonitor::start(bridge, interval);
    let mut state = monitor.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                if snapshot.bridge_available == Some(false) {
                    println!("adb is not available; monitoring stopped");
                    break;
                }
                print_snapshot(&snapshot);
            }
        }
    }

    monitor.stop().await;
    Ok(())
}

fn print_snapshot(snapshot: &MonitorSnapshot) {
    if snapshot.devices.is_empty() {
        println!("No devices connected");
        return;
    }

    for device in &snapshot.devices {
        let selected = if snapshot.selected.as_deref() == Some(device.serial.as_str()) {
            "* "
        } else {
            "  "
        };
        let status = match device.status {
            DeviceStatus::Ready => Style::new().green().apply_to("ready"),
            DeviceStatus::Unauthorized => Style::new().yellow().apply_to("unauthorized"),
            DeviceStatus::Offline => Style::new().red().apply_to("offline"),
            DeviceStatus::Unknown => Style::new().dim().apply_to("unknown"),
        };
        println!("{selected}{}  {status}", device.label());
    }
    println!();
}
