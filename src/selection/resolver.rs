//! Compatibility resolution
//!
//! Maps (bundle patches, target package/version, overrides, selection mode)
//! to the ordered set of patches that will actually run. Pure bookkeeping:
//! nothing here touches the filesystem or the engine.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::bundle::{LoadedBundle, LoadedPatch};
use crate::error::{RepatchError, Result};
use crate::selection::overrides::OverrideSet;

/// The package and version the input artifact carries
#[derive(Debug, Clone)]
pub struct PackageTarget {
    pub package: String,
    /// Unknown when the artifact could not be inspected and the caller gave
    /// no explicit version; treated as a mismatch against version lists.
    pub version: Option<String>,
}

/// Why a patch did not make the resolved set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    DisabledManually,
    IncompatiblePackage,
    IncompatibleVersion { supported: Vec<String> },
    SupportsNoVersion,
    NotSelected,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::DisabledManually => write!(f, "disabled manually"),
            ExclusionReason::IncompatiblePackage => write!(f, "incompatible with target package"),
            ExclusionReason::IncompatibleVersion { supported } => {
                write!(f, "incompatible version, supports: {}", supported.join(", "))
            }
            ExclusionReason::SupportsNoVersion => write!(f, "supports no version"),
            ExclusionReason::NotSelected => write!(f, "not selected"),
        }
    }
}

/// A patch that made the cut, with its runtime option map seeded from
/// declared defaults (overrides merge in via the binder)
#[derive(Debug, Clone)]
pub struct SelectedPatch {
    pub index: usize,
    pub name: String,
    pub options: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ExcludedPatch {
    pub index: usize,
    pub name: String,
    pub reason: ExclusionReason,
}

/// Outcome of one resolution call
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Patches that will run, in bundle order
    pub selected: Vec<SelectedPatch>,
    /// Everything else, with the reason, for diagnostics
    pub excluded: Vec<ExcludedPatch>,
}

/// Resolve the patches to apply, in bundle order.
///
/// `exclusive` includes only override-enabled patches; `force` ignores
/// version mismatches (package mismatches and explicit empty version lists
/// are still enforced). Disabling always wins over enabling for the same
/// identity.
pub fn resolve(
    bundle: &LoadedBundle,
    target: &PackageTarget,
    overrides: &OverrideSet,
    exclusive: bool,
    force: bool,
) -> Result<Resolution> {
    let mut resolution = Resolution::default();

    for patch in &bundle.patches {
        if overrides.is_disabled(patch) {
            exclude(&mut resolution, patch, ExclusionReason::DisabledManually);
            continue;
        }

        if let Some(reason) = compatibility_exclusion(patch, target, force)? {
            exclude(&mut resolution, patch, reason);
            continue;
        }

        let enabled = overrides.is_enabled(patch);
        let included = if exclusive {
            enabled
        } else {
            patch.definition.default_enabled || enabled
        };

        if !included {
            exclude(&mut resolution, patch, ExclusionReason::NotSelected);
            continue;
        }

        resolution.selected.push(SelectedPatch {
            index: patch.index,
            name: patch.definition.name.clone(),
            options: patch.definition.default_options(),
        });
    }

    Ok(resolution)
}

/// Evaluate the compatibility declarations of one patch against the target.
///
/// Returns `Ok(None)` when the patch passes, `Ok(Some(reason))` when it is
/// excluded, and an error for duplicate entries targeting the same package.
fn compatibility_exclusion(
    patch: &LoadedPatch,
    target: &PackageTarget,
    force: bool,
) -> Result<Option<ExclusionReason>> {
    if patch.definition.is_universal() {
        return Ok(None);
    }

    let entries = patch.definition.entries_for(&target.package);
    match entries.len() {
        0 => Ok(Some(ExclusionReason::IncompatiblePackage)),
        1 => {
            let entry = entries[0];
            match entry.versions.as_deref() {
                // No version list: any version of this package
                None => Ok(None),
                // Explicit empty list: supports no version, force included
                Some([]) => Ok(Some(ExclusionReason::SupportsNoVersion)),
                Some(versions) => {
                    let matches = target
                        .version
                        .as_deref()
                        .is_some_and(|v| versions.iter().any(|s| s == v));
                    if matches || force {
                        Ok(None)
                    } else {
                        Ok(Some(ExclusionReason::IncompatibleVersion {
                            supported: versions.to_vec(),
                        }))
                    }
                }
            }
        }
        _ => Err(RepatchError::DuplicateCompatibility {
            patch: patch.definition.name.clone(),
            package: target.package.clone(),
        }),
    }
}

fn exclude(resolution: &mut Resolution, patch: &LoadedPatch, reason: ExclusionReason) {
    resolution.excluded.push(ExcludedPatch {
        index: patch.index,
        name: patch.definition.name.clone(),
        reason,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::manifest::PatchDefinition;
    use std::path::PathBuf;

    fn bundle_from(json: &str) -> LoadedBundle {
        let definitions: Vec<PatchDefinition> = serde_json::from_str(json).unwrap();
        let mut bundle = LoadedBundle::default();
        for definition in definitions {
            bundle.patches.push(LoadedPatch {
                index: bundle.patches.len(),
                bundle: PathBuf::from("patches.json"),
                definition,
            });
        }
        bundle
    }

    /// A(universal, default-on), B(pkg=com.x, versions=[1.0]), C(pkg=com.x, versions=[])
    fn reference_bundle() -> LoadedBundle {
        bundle_from(
            r#"[
                { "name": "a" },
                { "name": "b", "compatible_packages": [
                    { "package": "com.x", "versions": ["1.0"] }
                ] },
                { "name": "c", "compatible_packages": [
                    { "package": "com.x", "versions": [] }
                ] }
            ]"#,
        )
    }

    fn target(package: &str, version: Option<&str>) -> PackageTarget {
        PackageTarget {
            package: package.to_string(),
            version: version.map(str::to_string),
        }
    }

    fn names(resolution: &Resolution) -> Vec<&str> {
        resolution.selected.iter().map(|p| p.name.as_str()).collect()
    }

    fn flags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matching_version_selects_a_and_b() {
        let bundle = reference_bundle();
        let overrides = OverrideSet::default();
        let resolution = resolve(
            &bundle,
            &target("com.x", Some("1.0")),
            &overrides,
            false,
            false,
        )
        .unwrap();

        assert_eq!(names(&resolution), vec!["a", "b"]);
        let c = resolution.excluded.iter().find(|e| e.name == "c").unwrap();
        assert_eq!(c.reason, ExclusionReason::SupportsNoVersion);
    }

    #[test]
    fn test_version_mismatch_excludes_b() {
        let bundle = reference_bundle();
        let overrides = OverrideSet::default();
        let resolution = resolve(
            &bundle,
            &target("com.x", Some("2.0")),
            &overrides,
            false,
            false,
        )
        .unwrap();

        assert_eq!(names(&resolution), vec!["a"]);
        let b = resolution.excluded.iter().find(|e| e.name == "b").unwrap();
        assert_eq!(
            b.reason,
            ExclusionReason::IncompatibleVersion {
                supported: vec!["1.0".to_string()]
            }
        );
    }

    #[test]
    fn test_force_overrides_version_mismatch_only() {
        let bundle = reference_bundle();
        let overrides = OverrideSet::default();
        let resolution = resolve(
            &bundle,
            &target("com.x", Some("2.0")),
            &overrides,
            false,
            true,
        )
        .unwrap();

        // B is forced in; C stays out even under force
        assert_eq!(names(&resolution), vec!["a", "b"]);
    }

    #[test]
    fn test_force_does_not_override_package_mismatch() {
        let bundle = reference_bundle();
        let overrides = OverrideSet::default();
        let resolution = resolve(
            &bundle,
            &target("com.other", Some("1.0")),
            &overrides,
            false,
            true,
        )
        .unwrap();

        assert_eq!(names(&resolution), vec!["a"]);
        let b = resolution.excluded.iter().find(|e| e.name == "b").unwrap();
        assert_eq!(b.reason, ExclusionReason::IncompatiblePackage);
    }

    #[test]
    fn test_universal_patch_included_regardless_of_target() {
        let bundle = reference_bundle();
        let overrides = OverrideSet::default();
        for tgt in [
            target("com.x", Some("1.0")),
            target("com.anything", None),
            target("org.elsewhere", Some("99")),
        ] {
            let resolution = resolve(&bundle, &tgt, &overrides, false, false).unwrap();
            assert!(names(&resolution).contains(&"a"));
        }
    }

    #[test]
    fn test_unknown_target_version_is_a_mismatch() {
        let bundle = reference_bundle();
        let overrides = OverrideSet::default();

        let resolution = resolve(&bundle, &target("com.x", None), &overrides, false, false).unwrap();
        assert_eq!(names(&resolution), vec!["a"]);

        let resolution = resolve(&bundle, &target("com.x", None), &overrides, false, true).unwrap();
        assert_eq!(names(&resolution), vec!["a", "b"]);
    }

    #[test]
    fn test_disable_wins_over_enable_same_identity() {
        let bundle = reference_bundle();
        // a sits at index 0: disable by name, enable by index
        let overrides =
            OverrideSet::from_flags(&[], &[0], &flags(&["a"]), &[], &[]).unwrap();
        let resolution = resolve(
            &bundle,
            &target("com.x", Some("1.0")),
            &overrides,
            false,
            false,
        )
        .unwrap();

        assert_eq!(names(&resolution), vec!["b"]);
        let a = resolution.excluded.iter().find(|e| e.name == "a").unwrap();
        assert_eq!(a.reason, ExclusionReason::DisabledManually);
    }

    #[test]
    fn test_exclusive_mode_requires_explicit_enable() {
        let bundle = reference_bundle();

        let none = OverrideSet::default();
        let resolution = resolve(
            &bundle,
            &target("com.x", Some("1.0")),
            &none,
            true,
            false,
        )
        .unwrap();
        assert!(resolution.selected.is_empty());

        let some = OverrideSet::from_flags(&flags(&["b"]), &[], &[], &[], &[]).unwrap();
        let resolution = resolve(
            &bundle,
            &target("com.x", Some("1.0")),
            &some,
            true,
            false,
        )
        .unwrap();
        assert_eq!(names(&resolution), vec!["b"]);
    }

    #[test]
    fn test_default_off_patch_needs_enable() {
        let bundle = bundle_from(r#"[ { "name": "opt-in", "enabled": false } ]"#);

        let none = OverrideSet::default();
        let resolution = resolve(&bundle, &target("com.x", None), &none, false, false).unwrap();
        assert!(resolution.selected.is_empty());
        assert_eq!(resolution.excluded[0].reason, ExclusionReason::NotSelected);

        let enabled = OverrideSet::from_flags(&flags(&["opt-in"]), &[], &[], &[], &[]).unwrap();
        let resolution = resolve(&bundle, &target("com.x", None), &enabled, false, false).unwrap();
        assert_eq!(names(&resolution), vec!["opt-in"]);
    }

    #[test]
    fn test_duplicate_compatibility_entries_error() {
        let bundle = bundle_from(
            r#"[
                { "name": "dup", "compatible_packages": [
                    { "package": "com.x", "versions": ["1.0"] },
                    { "package": "com.x", "versions": ["2.0"] }
                ] }
            ]"#,
        );
        let overrides = OverrideSet::default();
        let result = resolve(
            &bundle,
            &target("com.x", Some("1.0")),
            &overrides,
            false,
            false,
        );
        assert!(matches!(
            result.unwrap_err(),
            RepatchError::DuplicateCompatibility { .. }
        ));
    }

    #[test]
    fn test_duplicate_entries_for_other_package_are_tolerated() {
        let bundle = bundle_from(
            r#"[
                { "name": "p", "compatible_packages": [
                    { "package": "com.other", "versions": ["1.0"] },
                    { "package": "com.other", "versions": ["2.0"] },
                    { "package": "com.x" }
                ] }
            ]"#,
        );
        let overrides = OverrideSet::default();
        let resolution = resolve(
            &bundle,
            &target("com.x", Some("1.0")),
            &overrides,
            false,
            false,
        )
        .unwrap();
        assert_eq!(names(&resolution), vec!["p"]);
    }

    #[test]
    fn test_selection_preserves_bundle_order() {
        let bundle = bundle_from(
            r#"[
                { "name": "third" },
                { "name": "first" },
                { "name": "second" }
            ]"#,
        );
        let overrides = OverrideSet::default();
        let resolution = resolve(&bundle, &target("com.x", None), &overrides, false, false).unwrap();
        assert_eq!(names(&resolution), vec!["third", "first", "second"]);
        assert_eq!(
            resolution.selected.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_defaults_seed_option_map() {
        let bundle = bundle_from(
            r#"[
                { "name": "branding", "options": [
                    { "key": "appName", "default": "Example" },
                    { "key": "iconPath" }
                ] }
            ]"#,
        );
        let overrides = OverrideSet::default();
        let resolution = resolve(&bundle, &target("com.x", None), &overrides, false, false).unwrap();
        let options = &resolution.selected[0].options;
        assert_eq!(options["appName"], serde_json::json!("Example"));
        assert!(!options.contains_key("iconPath"));
    }
}
