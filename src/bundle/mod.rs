//! Patch bundle loading
//!
//! A bundle is a `.rpb` archive (zip carrying a `patches.json` manifest at
//! its root), a bare `patches.json` file, or a directory containing either.
//! Multiple bundles concatenate in argument order into one combined patch
//! list; a patch's position in that list is its stable ordinal index, the one
//! index-based overrides refer to.

pub mod manifest;

use std::path::{Path, PathBuf};

use async_zip::tokio::read::fs::ZipFileReader;
use walkdir::WalkDir;

use crate::error::{RepatchError, Result};
use manifest::PatchDefinition;

/// Manifest entry name inside a bundle archive
const MANIFEST_NAME: &str = "patches.json";

/// A patch definition together with its load position and origin
#[derive(Debug, Clone)]
pub struct LoadedPatch {
    /// Position in the combined, concatenated bundle ordering
    pub index: usize,
    /// Bundle the patch came from
    pub bundle: PathBuf,
    pub definition: PatchDefinition,
}

/// The combined patch list of all loaded bundles
#[derive(Debug, Clone, Default)]
pub struct LoadedBundle {
    pub patches: Vec<LoadedPatch>,
}

impl LoadedBundle {
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// All patches bearing `name` (duplicate names across bundles are legal)
    pub fn by_name<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a LoadedPatch> {
        self.patches.iter().filter(move |p| p.definition.name == name)
    }

    pub fn by_index(&self, index: usize) -> Option<&LoadedPatch> {
        self.patches.get(index)
    }
}

/// Load and concatenate bundles in argument order
pub async fn load_bundles(paths: &[PathBuf]) -> Result<LoadedBundle> {
    let mut bundle = LoadedBundle::default();

    for path in paths {
        let definitions = load_one(path).await?;
        for definition in definitions {
            bundle.patches.push(LoadedPatch {
                index: bundle.patches.len(),
                bundle: path.clone(),
                definition,
            });
        }
    }

    Ok(bundle)
}

async fn load_one(path: &Path) -> Result<Vec<PatchDefinition>> {
    if !path.exists() {
        return Err(RepatchError::BundleNotFound {
            path: path.display().to_string(),
        });
    }

    if path.is_dir() {
        return load_directory(path).await;
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("rpb") | Some("zip") => load_archive(path).await,
        _ => {
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                RepatchError::BundleReadFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
            })?;
            parse_manifest(path, &text)
        }
    }
}

/// A directory bundle either carries patches.json directly or holds bundle
/// files one level deep (scanned in sorted order for determinism).
async fn load_directory(path: &Path) -> Result<Vec<PatchDefinition>> {
    let direct = path.join(MANIFEST_NAME);
    if direct.is_file() {
        let text = tokio::fs::read_to_string(&direct).await.map_err(|e| {
            RepatchError::BundleReadFailed {
                path: direct.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        return parse_manifest(&direct, &text);
    }

    let mut entries: Vec<PathBuf> = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("rpb") | Some("zip") | Some("json")
            )
        })
        .collect();
    entries.sort();

    if entries.is_empty() {
        return Err(RepatchError::BundleNotFound {
            path: path.display().to_string(),
        });
    }

    let mut definitions = Vec::new();
    for entry in entries {
        definitions.extend(Box::pin(load_one(&entry)).await?);
    }
    Ok(definitions)
}

async fn load_archive(path: &Path) -> Result<Vec<PatchDefinition>> {
    let reader = ZipFileReader::new(path)
        .await
        .map_err(|e| RepatchError::BundleReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let index = reader.file().entries().iter().position(|entry| {
        entry
            .filename()
            .as_str()
            .map(|name| name == MANIFEST_NAME)
            .unwrap_or(false)
    });

    let Some(index) = index else {
        return Err(RepatchError::BundleManifestMissing {
            path: path.display().to_string(),
        });
    };

    let mut entry_reader =
        reader
            .reader_with_entry(index)
            .await
            .map_err(|e| RepatchError::BundleReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

    let mut buf = Vec::new();
    entry_reader
        .read_to_end_checked(&mut buf)
        .await
        .map_err(|e| RepatchError::BundleReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let text = String::from_utf8(buf).map_err(|e| RepatchError::BundleParseFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    parse_manifest(path, &text)
}

fn parse_manifest(path: &Path, text: &str) -> Result<Vec<PatchDefinition>> {
    serde_json::from_str(text).map_err(|e| RepatchError::BundleParseFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
