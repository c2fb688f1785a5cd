//! Install command implementation

use console::Style;

use crate::adb::bridge::{AdbBridge, InstallMode, InstallRequest};
use crate::cli::InstallArgs;
use crate::error::{RepatchError, Result};

/// Run the install command
pub async fn run(args: InstallArgs) -> Result<()> {
    if !args.artifact.is_file() {
        return Err(RepatchError::ArtifactNotFound {
            path: args.artifact.display().to_string(),
        });
    }

    let request = InstallRequest {
        serial: args.device.clone(),
        mode: match args.package {
            Some(package) if args.mount => InstallMode::Mount { package },
            _ => InstallMode::Copy,
        },
        allow_downgrade: args.allow_downgrade,
    };

    let bridge = AdbBridge::locate();
    let device = bridge.install(&args.artifact, &request).await?;

    println!(
        "{} {} to {}",
        Style::new().green().bold().apply_to("Installed"),
        args.artifact.display(),
        device.label()
    );
    Ok(())
}
