//! Artifact signing
//!
//! zipaligns the rebuilt APK, then signs it with apksigner. The keystore is
//! auto-generated with keytool on first use when the configured path does
//! not exist. Both tools are located the same way as adb: explicit
//! environment override, then SDK build-tools, then PATH.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::error::{RepatchError, Result};

const DEFAULT_KEYSTORE_PASS: &str = "repatch";
const DEFAULT_KEY_ALIAS: &str = "repatch";

/// Keystore configuration for the sign stage
#[derive(Debug, Clone)]
pub struct SigningConfig {
    pub keystore: PathBuf,
    pub keystore_pass: String,
    pub key_alias: String,
}

impl SigningConfig {
    /// Defaults: `~/.repatch/repatch.keystore`, auto-generated on first use
    pub fn new(
        keystore: Option<PathBuf>,
        keystore_pass: Option<String>,
        key_alias: Option<String>,
    ) -> Self {
        let keystore = keystore.unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".repatch")
                .join("repatch.keystore")
        });
        Self {
            keystore,
            keystore_pass: keystore_pass.unwrap_or_else(|| DEFAULT_KEYSTORE_PASS.to_string()),
            key_alias: key_alias.unwrap_or_else(|| DEFAULT_KEY_ALIAS.to_string()),
        }
    }
}

/// Zipalign `unsigned` and sign the result into `output`
pub async fn sign_artifact(
    unsigned: &Path,
    output: &Path,
    config: &SigningConfig,
    workdir: &Path,
) -> Result<()> {
    if !config.keystore.is_file() {
        generate_keystore(config).await?;
    }

    let aligned = workdir.join("aligned.apk");
    run_tool(
        "zipalign",
        &[
            "-f".as_ref(),
            "4".as_ref(),
            unsigned.as_os_str(),
            aligned.as_os_str(),
        ],
    )
    .await?;

    let ks_pass = format!("pass:{}", config.keystore_pass);
    run_tool(
        "apksigner",
        &[
            "sign".as_ref(),
            "--ks".as_ref(),
            config.keystore.as_os_str(),
            "--ks-pass".as_ref(),
            ks_pass.as_ref(),
            "--ks-key-alias".as_ref(),
            config.key_alias.as_ref(),
            "--out".as_ref(),
            output.as_os_str(),
            aligned.as_os_str(),
        ],
    )
    .await?;

    Ok(())
}

/// One-time keystore generation with keytool
async fn generate_keystore(config: &SigningConfig) -> Result<()> {
    if let Some(parent) = config.keystore.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RepatchError::KeystoreGenerationFailed {
                reason: format!("{}: {e}", parent.display()),
            })?;
    }

    let output = Command::new("keytool")
        .arg("-genkey")
        .arg("-v")
        .arg("-keystore")
        .arg(&config.keystore)
        .arg("-storepass")
        .arg(&config.keystore_pass)
        .arg("-alias")
        .arg(&config.key_alias)
        .arg("-keypass")
        .arg(&config.keystore_pass)
        .arg("-keyalg")
        .arg("RSA")
        .arg("-keysize")
        .arg("2048")
        .arg("-validity")
        .arg("10000")
        .arg("-dname")
        .arg("CN=repatch")
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RepatchError::ToolNotFound {
                    tool: "keytool".to_string(),
                }
            } else {
                RepatchError::KeystoreGenerationFailed {
                    reason: e.to_string(),
                }
            }
        })?;

    if !output.status.success() {
        return Err(RepatchError::KeystoreGenerationFailed {
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

async fn run_tool(tool: &str, args: &[&std::ffi::OsStr]) -> Result<()> {
    let output = Command::new(locate_tool(tool))
        .args(args)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RepatchError::ToolNotFound {
                    tool: tool.to_string(),
                }
            } else {
                RepatchError::SigningFailed {
                    reason: format!("{tool}: {e}"),
                }
            }
        })?;

    if !output.status.success() {
        return Err(RepatchError::SigningFailed {
            reason: format!(
                "{tool}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(())
}

/// Locate a build tool: `$ZIPALIGN`/`$APKSIGNER`, then the newest SDK
/// build-tools directory carrying it, then PATH
fn locate_tool(tool: &str) -> PathBuf {
    if let Ok(explicit) = std::env::var(tool.to_uppercase()) {
        if !explicit.is_empty() {
            return explicit.into();
        }
    }

    let executable = if cfg!(windows) {
        format!("{tool}.exe")
    } else {
        tool.to_string()
    };

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
            .filter(|p| p.join(&executable).is_file())
            .max();
        if let Some(dir) = newest {
            return dir.join(&executable);
        }
    }

    executable.into()
}
