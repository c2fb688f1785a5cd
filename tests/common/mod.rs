//! Common test utilities for repatch integration tests

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

/// A scratch directory with helpers for building patch fixtures
pub struct TestSetup {
    /// Temporary directory
    pub temp: TempDir,
}

impl TestSetup {
    /// Create a new test setup
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        Self { temp }
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Write a file into the scratch directory
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Write a placeholder input artifact
    #[allow(dead_code)]
    pub fn write_apk(&self, name: &str) -> PathBuf {
        self.write_file(name, "placeholder apk bytes")
    }

    /// Write a bare patches.json bundle
    #[allow(dead_code)]
    pub fn write_bundle(&self, name: &str, manifest: &str) -> PathBuf {
        self.write_file(name, manifest)
    }

    /// Write an executable shell script (fake engine, fake adb)
    #[allow(dead_code)]
    #[cfg(unix)]
    pub fn write_script(&self, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.write_file(name, &format!("#!/bin/sh\n{body}\n"));
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to mark script executable");
        path
    }

    /// Fake patch engine whose apply stage emits `apply_lines` as its event
    /// stream (plus the completion marker) and whose build stage writes the
    /// output artifact
    #[allow(dead_code)]
    #[cfg(unix)]
    pub fn fake_engine(&self, apply_lines: &[&str]) -> PathBuf {
        let events = apply_lines
            .iter()
            .map(|line| format!("echo '{line}'"))
            .collect::<Vec<_>>()
            .join("\n    ");
        self.write_script(
            "engine",
            &format!(
                r#"case "$1" in
  apply)
    {events}
    echo '{{"event":"finished"}}'
    ;;
  build)
    # build --artifact A --changes DIR --output OUT
    echo 'rebuilt apk' > "$7"
    ;;
esac"#
            ),
        )
    }

    /// Fake adb reporting the given `devices -l` body
    #[allow(dead_code)]
    #[cfg(unix)]
    pub fn fake_adb(&self, body: &str) -> PathBuf {
        self.write_script("adb", body)
    }

    /// Read a file from the scratch directory
    #[allow(dead_code)]
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.path().join(name)).expect("Failed to read file")
    }

    /// Check if a file exists in the scratch directory
    #[allow(dead_code)]
    pub fn file_exists(&self, name: &str) -> bool {
        self.path().join(name).exists()
    }
}

/// Command running the real repatch binary
// Temporary fix for deprecated cargo_bin - will be updated when build-dir issues are resolved
#[allow(deprecated)]
pub fn repatch_cmd() -> Command {
    Command::cargo_bin("repatch").expect("repatch binary not built")
}

/// A two-patch manifest used across tests: one universal default-on patch,
/// one opt-in patch for com.example.app 1.0
#[allow(dead_code)]
pub const BASIC_BUNDLE: &str = r#"[
    { "name": "strip-ads", "description": "Remove advertisements" },
    {
        "name": "custom-branding",
        "description": "Replace name and icon",
        "enabled": false,
        "compatible_packages": [
            { "package": "com.example.app", "versions": ["1.0"] }
        ],
        "options": [
            { "key": "appName", "title": "App name", "type": "string", "default": "Example" }
        ]
    }
]"#;
