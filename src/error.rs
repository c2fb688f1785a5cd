//! Error types and handling for repatch
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for repatch operations
#[derive(Error, Diagnostic, Debug)]
pub enum RepatchError {
    // Bundle errors
    #[error("Patch bundle not found: {path}")]
    #[diagnostic(
        code(repatch::bundle::not_found),
        help("Check that the bundle path is correct; .rpb archives, patches.json files and bundle directories are accepted")
    )]
    BundleNotFound { path: String },

    #[error("Failed to read patch bundle: {path}")]
    #[diagnostic(code(repatch::bundle::read_failed))]
    BundleReadFailed { path: String, reason: String },

    #[error("Failed to parse patch bundle: {path}")]
    #[diagnostic(code(repatch::bundle::parse_failed))]
    BundleParseFailed { path: String, reason: String },

    #[error("Bundle archive has no patches.json entry: {path}")]
    #[diagnostic(
        code(repatch::bundle::manifest_missing),
        help("A .rpb bundle is a zip archive carrying a patches.json manifest at its root")
    )]
    BundleManifestMissing { path: String },

    // Selection errors
    #[error("Patch '{patch}' declares more than one compatibility entry for package '{package}'")]
    #[diagnostic(
        code(repatch::selection::duplicate_compatibility),
        help("Fix the bundle: at most one compatibility entry per package is allowed")
    )]
    DuplicateCompatibility { patch: String, package: String },

    #[error("Patch index {index} is out of range (bundle has {count} patches)")]
    #[diagnostic(
        code(repatch::selection::index_out_of_range),
        help("Indexes refer to the combined bundle ordering; run 'repatch list-patches' to see them")
    )]
    PatchIndexOutOfRange { index: usize, count: usize },

    #[error("Invalid option assignment: {value}")]
    #[diagnostic(
        code(repatch::selection::invalid_option),
        help("Use PATCH:KEY=VALUE or PATCH:KEY, where PATCH is a patch name or index")
    )]
    InvalidOptionAssignment { value: String, reason: String },

    #[error("No patches selected for {package}")]
    #[diagnostic(
        code(repatch::selection::empty),
        help("Check --enable/--disable flags and the target package/version; --force ignores version mismatches")
    )]
    EmptySelection { package: String },

    // Artifact errors
    #[error("Input artifact not found: {path}")]
    #[diagnostic(code(repatch::artifact::not_found))]
    ArtifactNotFound { path: String },

    #[error("Failed to inspect artifact: {reason}")]
    #[diagnostic(
        code(repatch::artifact::inspection_failed),
        help("Pass --package and --package-version to skip aapt-based detection")
    )]
    ArtifactInspectionFailed { reason: String },

    #[error("Cannot determine target package for {path}")]
    #[diagnostic(
        code(repatch::artifact::package_unknown),
        help("Multi-artifact containers are not inspected; pass --package (and --package-version)")
    )]
    PackageUnknown { path: String },

    #[error("Container conversion failed: {reason}")]
    #[diagnostic(code(repatch::convert::failed))]
    ContainerConversionFailed { reason: String },

    // Engine errors
    #[error("No patch engine configured")]
    #[diagnostic(
        code(repatch::engine::not_configured),
        help("Pass --engine PATH or set the REPATCH_ENGINE environment variable")
    )]
    EngineNotConfigured,

    #[error("Failed to start patch engine: {reason}")]
    #[diagnostic(code(repatch::engine::spawn_failed))]
    EngineSpawnFailed { reason: String },

    #[error("Patch engine protocol violation: {reason}")]
    #[diagnostic(code(repatch::engine::protocol))]
    EngineProtocol { reason: String },

    #[error("Patch engine failed: {reason}")]
    #[diagnostic(code(repatch::engine::failed))]
    EngineFailed { reason: String },

    #[error("Artifact rebuild failed: {reason}")]
    #[diagnostic(code(repatch::engine::rebuild_failed))]
    RebuildFailed { reason: String },

    // Signing errors
    #[error("Signing failed: {reason}")]
    #[diagnostic(code(repatch::sign::failed))]
    SigningFailed { reason: String },

    #[error("Keystore generation failed: {reason}")]
    #[diagnostic(
        code(repatch::sign::keystore_failed),
        help("keytool (from a JRE) must be on PATH to auto-generate a keystore")
    )]
    KeystoreGenerationFailed { reason: String },

    #[error("Required tool not found: {tool}")]
    #[diagnostic(
        code(repatch::tools::not_found),
        help("Install the Android SDK build tools and set ANDROID_SDK_ROOT, or put the tool on PATH")
    )]
    ToolNotFound { tool: String },

    // Device errors
    #[error("adb executable not found")]
    #[diagnostic(
        code(repatch::adb::not_found),
        help("Install Android platform tools and set ANDROID_SDK_ROOT, or set the ADB environment variable")
    )]
    BridgeNotFound,

    #[error("adb invocation failed: {reason}")]
    #[diagnostic(code(repatch::adb::invocation_failed))]
    BridgeInvocationFailed { reason: String },

    #[error("No device connected")]
    #[diagnostic(
        code(repatch::adb::no_device),
        help("Connect a device, enable USB debugging and authorize this host")
    )]
    NoDevices,

    #[error("Multiple devices connected: {candidates}")]
    #[diagnostic(
        code(repatch::adb::ambiguous_device),
        help("Pass --device SERIAL to pick one")
    )]
    AmbiguousDevice { candidates: String },

    #[error("Device not found: {serial}")]
    #[diagnostic(code(repatch::adb::device_not_found))]
    DeviceNotFound { serial: String },

    #[error("Device {serial} is not ready: {status}")]
    #[diagnostic(
        code(repatch::adb::device_not_ready),
        help("Unauthorized devices must confirm the USB debugging prompt; offline devices must reconnect")
    )]
    DeviceNotReady { serial: String, status: String },

    #[error("Install on {serial} rejected: {cause}")]
    #[diagnostic(code(repatch::adb::install_rejected))]
    InstallRejected { serial: String, cause: String },

    // Pipeline errors
    #[error("Patching cancelled")]
    #[diagnostic(code(repatch::pipeline::cancelled))]
    Cancelled,

    #[error("Patching finished with {failed} failed patch(es)")]
    #[diagnostic(
        code(repatch::pipeline::partial_failure),
        help("The artifact was still built from the patches that succeeded; see the report for details")
    )]
    PartialFailure { failed: usize },

    #[error("Failed to write report: {path}")]
    #[diagnostic(code(repatch::report::write_failed))]
    ReportWriteFailed { path: String, reason: String },

    // File system errors
    #[error("Failed to read file: {path}")]
    #[diagnostic(code(repatch::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}")]
    #[diagnostic(code(repatch::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(repatch::fs::io_error))]
    IoError { message: String },
}

impl From<std::io::Error> for RepatchError {
    fn from(err: std::io::Error) -> Self {
        RepatchError::IoError {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, RepatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RepatchError::BundleNotFound {
            path: "patches.rpb".to_string(),
        };
        assert_eq!(err.to_string(), "Patch bundle not found: patches.rpb");
    }

    #[test]
    fn test_error_code() {
        let err = RepatchError::BundleNotFound {
            path: "patches.rpb".to_string(),
        };
        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("repatch::bundle::not_found".to_string())
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RepatchError = io_err.into();
        assert!(matches!(err, RepatchError::IoError { .. }));
    }

    #[test]
    fn test_duplicate_compatibility_error() {
        let err = RepatchError::DuplicateCompatibility {
            patch: "dark-theme".to_string(),
            package: "com.example.app".to_string(),
        };
        assert!(err.to_string().contains("dark-theme"));
        assert!(err.to_string().contains("com.example.app"));
    }

    #[test]
    fn test_index_out_of_range_error() {
        let err = RepatchError::PatchIndexOutOfRange { index: 9, count: 3 };
        assert!(err.to_string().contains('9'));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_ambiguous_device_error() {
        let err = RepatchError::AmbiguousDevice {
            candidates: "emulator-5554, R5CT10XYZ".to_string(),
        };
        assert!(err.to_string().contains("emulator-5554"));
        assert!(err.to_string().contains("R5CT10XYZ"));
    }

    #[test]
    fn test_install_rejected_error() {
        let err = RepatchError::InstallRejected {
            serial: "emulator-5554".to_string(),
            cause: "insufficient storage on device".to_string(),
        };
        assert!(err.to_string().contains("insufficient storage"));
    }
}
