//! Per-run temporary workdirs
//!
//! A patching run stages everything (converted artifact, engine changes,
//! unsigned output) in one workdir named after the input artifact's digest,
//! released on drop. The base is never a relative path, so workdirs are
//! never created under the current working directory (e.g. when TMPDIR=tmp
//! and cwd is a repo).

use std::env;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{RepatchError, Result};
use crate::hash;

/// Directory suitable for creating temporary workdirs; always absolute
pub fn temp_dir_base() -> PathBuf {
    let t = env::temp_dir();
    if t.is_absolute() {
        t
    } else {
        #[cfg(windows)]
        {
            env::var("TEMP")
                .or_else(|_| env::var("TMP"))
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("C:\\Windows\\Temp"))
        }
        #[cfg(not(windows))]
        {
            PathBuf::from("/tmp")
        }
    }
}

/// Create the workdir for one patching run over `input`
pub fn create_workdir(input: &Path) -> Result<TempDir> {
    let digest = hash::hash_file(input)?;
    tempfile::Builder::new()
        .prefix(&format!("repatch-{}-", hash::short_digest(&digest, 12)))
        .tempdir_in(temp_dir_base())
        .map_err(|e| RepatchError::IoError {
            message: format!("failed to create workdir: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_base_is_absolute() {
        assert!(temp_dir_base().is_absolute());
    }

    #[test]
    fn test_create_workdir_named_after_input() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("app.apk");
        std::fs::write(&input, "apk bytes").unwrap();

        let workdir = create_workdir(&input).unwrap();
        let name = workdir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("repatch-"));
        assert!(workdir.path().is_dir());
    }

    #[test]
    fn test_create_workdir_missing_input() {
        let result = create_workdir(Path::new("/nonexistent/app.apk"));
        assert!(result.is_err());
    }
}
