//! Device monitor
//!
//! A background task that probes bridge availability once, then refreshes
//! the device list on a fixed period until explicitly stopped. State is
//! published as whole-snapshot replacements through a watch channel, so
//! concurrent readers always see a complete, consistent snapshot; writes
//! happen only on the monitor task, fed by refreshes and explicit selection
//! commands.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::bridge::AdbBridge;
use super::Device;

/// Default refresh period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// One published monitor state
#[derive(Debug, Clone, Default)]
pub struct MonitorSnapshot {
    pub devices: Vec<Device>,
    /// Serial of the currently selected device
    pub selected: Option<String>,
    /// `None` until the availability probe has run
    pub bridge_available: Option<bool>,
}

impl MonitorSnapshot {
    pub fn selected_device(&self) -> Option<&Device> {
        let serial = self.selected.as_deref()?;
        self.devices.iter().find(|d| d.serial == serial)
    }
}

enum MonitorCommand {
    Select(Option<String>),
}

/// Handle to a running device monitor
pub struct DeviceMonitor {
    state: watch::Receiver<MonitorSnapshot>,
    commands: mpsc::UnboundedSender<MonitorCommand>,
    task: JoinHandle<()>,
}

impl DeviceMonitor {
    /// Start monitoring. The task probes availability once; when the bridge
    /// is unavailable it records that and never polls.
    pub fn start(bridge: AdbBridge, interval: Duration) -> Self {
        let (state_tx, state_rx) = watch::channel(MonitorSnapshot::default());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(bridge, interval, state_tx, command_rx));
        Self {
            state: state_rx,
            commands: command_tx,
            task,
        }
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.state.borrow().clone()
    }

    /// Subscribe for change notification
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.state.clone()
    }

    /// Set the selection directly. Takes precedence until the next refresh
    /// reconciles it against the actual device list.
    pub fn select(&self, serial: Option<String>) {
        let _ = self.commands.send(MonitorCommand::Select(serial));
    }

    /// Stop polling and wait for the task to finish
    pub async fn stop(self) {
        drop(self.commands);
        let _ = self.task.await;
    }
}

async fn run(
    bridge: AdbBridge,
    interval: Duration,
    state: watch::Sender<MonitorSnapshot>,
    mut commands: mpsc::UnboundedReceiver<MonitorCommand>,
) {
    let available = bridge.is_available().await;
    state.send_replace(MonitorSnapshot {
        devices: Vec::new(),
        selected: None,
        bridge_available: Some(available),
    });
    if !available {
        return;
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // A failed refresh publishes an empty list; the probe already
                // succeeded, so keep polling for the bridge to come back
                let devices = bridge.list_devices().await.unwrap_or_default();
                state.send_modify(|snapshot| {
                    let previous = snapshot.selected.take();
                    snapshot.selected = reconcile_selection(previous.as_deref(), &devices);
                    snapshot.devices = devices;
                });
            }
            command = commands.recv() => match command {
                Some(MonitorCommand::Select(serial)) => {
                    state.send_modify(|snapshot| {
                        snapshot.selected = serial;
                    });
                }
                None => return,
            }
        }
    }
}

/// Selection rule applied on every refresh: preserve a still-ready previous
/// selection, auto-select a sole ready device, otherwise clear.
pub fn reconcile_selection(previous: Option<&str>, devices: &[Device]) -> Option<String> {
    let ready: Vec<&Device> = devices.iter().filter(|d| d.is_ready()).collect();

    if let Some(previous) = previous {
        if ready.iter().any(|d| d.serial == previous) {
            return Some(previous.to_string());
        }
    }

    match ready.as_slice() {
        [single] => Some(single.serial.clone()),
        _ => None,
    }
}
