//! Input artifact inspection
//!
//! The resolver needs the target package name and version before the
//! pipeline starts. Plain APKs are inspected with `aapt dump badging`;
//! multi-artifact containers are not inspected and require an explicit
//! `--package` (conversion happens later, as a pipeline stage). Explicit
//! CLI values always win over detection.

use std::path::Path;

use tokio::process::Command;

use crate::error::{RepatchError, Result};
use crate::pipeline::convert::is_container;
use crate::selection::PackageTarget;

/// Determine the target package and version of `input`.
///
/// `package`/`version` are the CLI overrides. Version may stay unknown
/// (aapt missing, badging without a versionName); the resolver treats an
/// unknown version as a mismatch against version lists.
pub async fn inspect(
    input: &Path,
    package: Option<String>,
    version: Option<String>,
) -> Result<PackageTarget> {
    if !input.is_file() {
        return Err(RepatchError::ArtifactNotFound {
            path: input.display().to_string(),
        });
    }

    if let Some(package) = package {
        return Ok(PackageTarget { package, version });
    }

    if is_container(input) {
        return Err(RepatchError::PackageUnknown {
            path: input.display().to_string(),
        });
    }

    let badging = dump_badging(input).await?;
    let Some(package) = parse_badging_field(&badging, "name") else {
        return Err(RepatchError::ArtifactInspectionFailed {
            reason: format!("no package name in badging output for {}", input.display()),
        });
    };

    Ok(PackageTarget {
        package,
        version: version.or_else(|| parse_badging_field(&badging, "versionName")),
    })
}

/// Locate aapt: `$AAPT`, then SDK build-tools (newest version dir), then PATH
fn aapt_program() -> std::path::PathBuf {
    if let Ok(explicit) = std::env::var("AAPT") {
        if !explicit.is_empty() {
            return explicit.into();
        }
    }

    for var in ["ANDROID_SDK_ROOT", "ANDROID_HOME"] {
        let Ok(sdk) = std::env::var(var) else {
            continue;
        };
        let build_tools = Path::new(&sdk).join("build-tools");
        let Ok(entries) = std::fs::read_dir(&build_tools) else {
            continue;
        };
        let newest = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.join(aapt_executable()).is_file())
            .max();
        if let Some(dir) = newest {
            return dir.join(aapt_executable());
        }
    }

    aapt_executable().into()
}

fn aapt_executable() -> &'static str {
    if cfg!(windows) { "aapt.exe" } else { "aapt" }
}

async fn dump_badging(input: &Path) -> Result<String> {
    let output = Command::new(aapt_program())
        .arg("dump")
        .arg("badging")
        .arg(input)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RepatchError::ToolNotFound {
                    tool: "aapt".to_string(),
                }
            } else {
                RepatchError::ArtifactInspectionFailed {
                    reason: e.to_string(),
                }
            }
        })?;

    if !output.status.success() {
        return Err(RepatchError::ArtifactInspectionFailed {
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Pull a `field='value'` attribute off the `package:` badging line.
///
/// The line looks like
/// `package: name='com.example.app' versionCode='19' versionName='1.0'`.
fn parse_badging_field(badging: &str, field: &str) -> Option<String> {
    let line = badging
        .lines()
        .find(|l| l.trim_start().starts_with("package:"))?;
    let marker = format!("{field}='");
    let start = line.find(&marker)? + marker.len();
    let end = line[start..].find('\'')?;
    let value = &line[start..start + end];
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
