//! Device bridge: adb discovery, installation and monitoring

pub mod bridge;
pub mod monitor;

use std::fmt;

use serde::Serialize;

/// Connection state of one device as reported by `adb devices`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Authorized and reachable; the only state eligible for installation
    Ready,
    Unauthorized,
    Offline,
    Unknown,
}

impl DeviceStatus {
    /// Map the status token of a `adb devices` line
    pub fn parse(token: &str) -> Self {
        match token {
            "device" => DeviceStatus::Ready,
            "unauthorized" => DeviceStatus::Unauthorized,
            "offline" => DeviceStatus::Offline,
            _ => DeviceStatus::Unknown,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Ready => write!(f, "ready"),
            DeviceStatus::Unauthorized => write!(f, "unauthorized"),
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// One connected device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub serial: String,
    pub status: DeviceStatus,
    /// Human model name, when resolvable
    pub model: Option<String>,
    /// CPU architecture (abi), when resolvable
    pub architecture: Option<String>,
}

impl Device {
    pub fn is_ready(&self) -> bool {
        self.status == DeviceStatus::Ready
    }

    /// Serial plus model for human-facing listings
    pub fn label(&self) -> String {
        match &self.model {
            Some(model) => format!("{} ({model})", self.serial),
            None => self.serial.clone(),
        }
    }
}
