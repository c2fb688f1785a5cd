//! Container format conversion
//!
//! Multi-artifact containers (`.apks`, `.xapk`, `.apkm`) are zip files
//! carrying several APKs. The pipeline works on a single artifact, so the
//! base APK is extracted into the workdir before patching: `base.apk` or
//! `universal.apk` when present, otherwise the largest APK entry (split
//! configs are small).

use std::path::{Path, PathBuf};

use async_zip::tokio::read::fs::ZipFileReader;

use crate::error::{RepatchError, Result};

const CONTAINER_EXTENSIONS: &[&str] = &["apks", "xapk", "apkm"];

const PREFERRED_ENTRIES: &[&str] = &["base.apk", "universal.apk"];

/// Whether the input needs conversion before patching
pub fn is_container(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            CONTAINER_EXTENSIONS
                .iter()
                .any(|c| ext.eq_ignore_ascii_case(c))
        })
}

/// Merge a container down to a single APK in `workdir`; returns its path
pub async fn merge_container(input: &Path, workdir: &Path) -> Result<PathBuf> {
    let reader = ZipFileReader::new(input)
        .await
        .map_err(|e| RepatchError::ContainerConversionFailed {
            reason: format!("{}: {e}", input.display()),
        })?;

    let mut apk_entries: Vec<(usize, String, u64)> = Vec::new();
    for (index, entry) in reader.file().entries().iter().enumerate() {
        let Ok(name) = entry.filename().as_str() else {
            continue;
        };
        if name.ends_with(".apk") {
            apk_entries.push((index, name.to_string(), entry.uncompressed_size()));
        }
    }

    let chosen = apk_entries
        .iter()
        .find(|(_, name, _)| {
            PREFERRED_ENTRIES
                .iter()
                .any(|p| name == p || name.ends_with(&format!("/{p}")))
        })
        .or_else(|| apk_entries.iter().max_by_key(|(_, _, size)| *size));

    let Some((index, name, _)) = chosen else {
        return Err(RepatchError::ContainerConversionFailed {
            reason: format!("{}: no APK entries in container", input.display()),
        });
    };

    let mut entry_reader =
        reader
            .reader_with_entry(*index)
            .await
            .map_err(|e| RepatchError::ContainerConversionFailed {
                reason: format!("{name}: {e}"),
            })?;

    let mut data = Vec::new();
    entry_reader
        .read_to_end_checked(&mut data)
        .await
        .map_err(|e| RepatchError::ContainerConversionFailed {
            reason: format!("{name}: {e}"),
        })?;

    let merged = workdir.join("base.apk");
    tokio::fs::write(&merged, data)
        .await
        .map_err(|e| RepatchError::FileWriteFailed {
            path: merged.display().to_string(),
            reason: e.to_string(),
        })?;

    Ok(merged)
}
