//! adb client
//!
//! Wraps the platform `adb` executable: device discovery via `devices -l`
//! with secondary `getprop` lookups, and installation in copy (package
//! installer) or mount (root bind-mount) mode. Install failures are
//! translated through a fixed table of known package-manager error codes;
//! unrecognized output is surfaced verbatim.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Output;

use tokio::process::Command;

use crate::error::{RepatchError, Result};

use super::{Device, DeviceStatus};

/// Known package-manager failure codes and their human-readable causes
const INSTALL_FAILURES: &[(&str, &str)] = &[
    (
        "INSTALL_FAILED_VERSION_DOWNGRADE",
        "a newer version of this app is already installed; pass --allow-downgrade or uninstall it first",
    ),
    (
        "INSTALL_FAILED_UPDATE_INCOMPATIBLE",
        "signature mismatch with the installed app; uninstall the existing app first",
    ),
    (
        "INSTALL_FAILED_INSUFFICIENT_STORAGE",
        "insufficient storage on the device",
    ),
    (
        "INSTALL_FAILED_ALREADY_EXISTS",
        "the app is already installed",
    ),
    (
        "INSTALL_FAILED_OLDER_SDK",
        "the device runs an older Android version than the app supports",
    ),
    (
        "INSTALL_FAILED_MISSING_SHARED_LIBRARY",
        "the device is missing a shared library the app requires",
    ),
    (
        "INSTALL_FAILED_TEST_ONLY",
        "the package is marked test-only",
    ),
    (
        "INSTALL_PARSE_FAILED_NO_CERTIFICATES",
        "the artifact is unsigned or its signature is invalid",
    ),
    (
        "INSTALL_FAILED_USER_RESTRICTED",
        "installation blocked by a device policy or user restriction",
    ),
];

/// How the artifact lands on the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallMode {
    /// Regular package-installer install (`adb install -r`)
    Copy,
    /// Root bind-mount over the installed base APK of `package`
    Mount { package: String },
}

/// One install request
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Explicit device serial; `None` auto-picks the single ready device
    pub serial: Option<String>,
    pub mode: InstallMode,
    pub allow_downgrade: bool,
}

/// Client for the adb command-line bridge
#[derive(Debug, Clone)]
pub struct AdbBridge {
    program: PathBuf,
}

impl AdbBridge {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate adb: `$ADB`, then SDK platform-tools, then `PATH`
    pub fn locate() -> Self {
        if let Ok(explicit) = env::var("ADB") {
            if !explicit.is_empty() {
                return Self::new(explicit);
            }
        }

        for var in ["ANDROID_SDK_ROOT", "ANDROID_HOME"] {
            if let Ok(sdk) = env::var(var) {
                let candidate = Path::new(&sdk)
                    .join("platform-tools")
                    .join(adb_executable());
                if candidate.is_file() {
                    return Self::new(candidate);
                }
            }
        }

        Self::new(adb_executable())
    }

    /// One availability probe (`adb version`)
    pub async fn is_available(&self) -> bool {
        self.run(&["version"]).await.is_ok_and(|o| o.status.success())
    }

    /// List connected devices, resolving model and architecture for ready
    /// devices via secondary property queries
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let output = self.run(&["devices", "-l"]).await?;
        if !output.status.success() {
            return Err(RepatchError::BridgeInvocationFailed {
                reason: stderr_of(&output),
            });
        }

        let mut devices = parse_device_list(&String::from_utf8_lossy(&output.stdout));

        for device in &mut devices {
            if !device.is_ready() {
                continue;
            }
            if let Some(model) = self.getprop(&device.serial, "ro.product.model").await {
                device.model = Some(model);
            }
            if let Some(abi) = self.getprop(&device.serial, "ro.product.cpu.abi").await {
                device.architecture = Some(abi);
            }
        }

        Ok(devices)
    }

    /// Install `artifact` per `request`; returns the device installed to
    pub async fn install(&self, artifact: &Path, request: &InstallRequest) -> Result<Device> {
        let devices = self.list_devices().await?;
        let device = pick_device(&devices, request.serial.as_deref())?;

        match &request.mode {
            InstallMode::Copy => {
                self.install_copy(artifact, &device, request.allow_downgrade)
                    .await?
            }
            InstallMode::Mount { package } => {
                self.install_mount(artifact, &device, package).await?
            }
        }

        Ok(device)
    }

    async fn install_copy(
        &self,
        artifact: &Path,
        device: &Device,
        allow_downgrade: bool,
    ) -> Result<()> {
        let artifact = artifact.to_string_lossy();
        let mut args = vec!["-s", &device.serial, "install", "-r"];
        if allow_downgrade {
            args.push("-d");
        }
        args.push(&artifact);

        let output = self.run(&args).await?;
        if output.status.success() {
            return Ok(());
        }

        Err(RepatchError::InstallRejected {
            serial: device.serial.clone(),
            cause: categorize_install_failure(&combined_output(&output)),
        })
    }

    /// Rooted install: push next to the app and bind-mount over its base APK
    async fn install_mount(&self, artifact: &Path, device: &Device, package: &str) -> Result<()> {
        let staged = format!("/data/local/tmp/repatch/{package}.apk");
        let artifact = artifact.to_string_lossy();

        self.shell_checked(device, &["mkdir", "-p", "/data/local/tmp/repatch"])
            .await?;

        let push = self
            .run(&["-s", &device.serial, "push", &artifact, &staged])
            .await?;
        if !push.status.success() {
            return Err(RepatchError::InstallRejected {
                serial: device.serial.clone(),
                cause: combined_output(&push).trim().to_string(),
            });
        }

        let pm_path = self
            .su(device, &format!("pm path {package}"))
            .await?;
        let base = pm_path
            .lines()
            .find_map(|l| l.trim().strip_prefix("package:"))
            .map(str::to_string)
            .ok_or_else(|| RepatchError::InstallRejected {
                serial: device.serial.clone(),
                cause: format!("{package} is not installed on the device; mount install patches an existing install"),
            })?;

        self.su(device, &format!("mount -o bind {staged} {base}"))
            .await?;
        self.su(device, &format!("am force-stop {package}")).await?;
        Ok(())
    }

    /// Run a shell command as root via `su -c`
    async fn su(&self, device: &Device, command: &str) -> Result<String> {
        let output = self
            .run(&["-s", &device.serial, "shell", "su", "-c", command])
            .await?;
        let combined = combined_output(&output);
        if !output.status.success() || combined.contains("su: not found") {
            let cause = if combined.contains("su: not found") {
                "root access required for mount install (su not available)".to_string()
            } else {
                combined.trim().to_string()
            };
            return Err(RepatchError::InstallRejected {
                serial: device.serial.clone(),
                cause,
            });
        }
        Ok(combined)
    }

    async fn shell_checked(&self, device: &Device, args: &[&str]) -> Result<()> {
        let mut full = vec!["-s", &device.serial, "shell"];
        full.extend_from_slice(args);
        let output = self.run(&full).await?;
        if !output.status.success() {
            return Err(RepatchError::InstallRejected {
                serial: device.serial.clone(),
                cause: combined_output(&output).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Best-effort property query; unreachable devices yield `None`
    async fn getprop(&self, serial: &str, property: &str) -> Option<String> {
        let output = self
            .run(&["-s", serial, "shell", "getprop", property])
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() { None } else { Some(value) }
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RepatchError::BridgeNotFound
                } else {
                    RepatchError::BridgeInvocationFailed {
                        reason: e.to_string(),
                    }
                }
            })
    }
}

fn adb_executable() -> &'static str {
    if cfg!(windows) { "adb.exe" } else { "adb" }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push('\n');
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

/// Parse the output of `adb devices -l`
pub fn parse_device_list(text: &str) -> Vec<Device> {
    text.lines().filter_map(parse_device_line).collect()
}

/// Parse one `adb devices -l` line into a device.
///
/// Lines look like
/// `emulator-5554  device product:sdk_gphone64 model:sdk_gphone64_x86_64 transport_id:1`;
/// header, daemon chatter and blank lines yield `None`.
fn parse_device_line(line: &str) -> Option<Device> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("List of devices") || line.starts_with('*') {
        return None;
    }

    let mut parts = line.split_whitespace();
    let serial = parts.next()?.to_string();
    let status = DeviceStatus::parse(parts.next()?);

    // The -l hint is a fallback; ready devices get the getprop value later
    let model = parts
        .clone()
        .find_map(|p| p.strip_prefix("model:"))
        .map(|m| m.replace('_', " "));
    let architecture = parts.find_map(|p| p.strip_prefix("abi:")).map(str::to_string);

    Some(Device {
        serial,
        status,
        model,
        architecture,
    })
}

/// Apply the device-targeting rules: an explicit serial must name a ready
/// device; with no serial exactly one ready device must exist.
pub fn pick_device(devices: &[Device], serial: Option<&str>) -> Result<Device> {
    if let Some(serial) = serial {
        let device = devices
            .iter()
            .find(|d| d.serial == serial)
            .ok_or_else(|| RepatchError::DeviceNotFound {
                serial: serial.to_string(),
            })?;
        if !device.is_ready() {
            return Err(RepatchError::DeviceNotReady {
                serial: serial.to_string(),
                status: device.status.to_string(),
            });
        }
        return Ok(device.clone());
    }

    let ready: Vec<&Device> = devices.iter().filter(|d| d.is_ready()).collect();
    match ready.as_slice() {
        [] => Err(RepatchError::NoDevices),
        [single] => Ok((*single).clone()),
        multiple => Err(RepatchError::AmbiguousDevice {
            candidates: multiple
                .iter()
                .map(|d| d.label())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Translate install failure output via the known-code table; unrecognized
/// output is surfaced verbatim
pub fn categorize_install_failure(output: &str) -> String {
    for (code, cause) in INSTALL_FAILURES {
        if output.contains(code) {
            return (*cause).to_string();
        }
    }
    output.trim().to_string()
}
