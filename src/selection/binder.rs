//! Option binding
//!
//! Merges caller option assignments into the resolved patches' runtime
//! option maps. Values are carried opaquely; type coercion against the
//! declared option types is the patch engine's responsibility.

use crate::bundle::LoadedBundle;
use crate::selection::overrides::{OverrideSet, PatchSelector};
use crate::selection::resolver::Resolution;

/// Attach caller option assignments to the resolved set.
///
/// Index targets are resolved to a patch name first, then every selected
/// patch bearing that name receives the assignment, overwriting any default.
/// Returns notices for assignments whose target is not in the resolved set
/// (the patch may have been excluded by compatibility).
pub fn bind(
    resolution: &mut Resolution,
    bundle: &LoadedBundle,
    overrides: &OverrideSet,
) -> Vec<String> {
    let mut notices = Vec::new();

    for assignment in overrides.assignments() {
        let name = match &assignment.target {
            PatchSelector::Name(name) => Some(name.clone()),
            PatchSelector::Index(index) => bundle
                .by_index(*index)
                .map(|p| p.definition.name.clone()),
        };

        let Some(name) = name else {
            // Out-of-range indexes are rejected by OverrideSet::validate
            // before resolution; this is unreachable in the normal flow.
            notices.push(format!("option target {:?} not found", assignment.target));
            continue;
        };

        let mut applied = false;
        for patch in resolution.selected.iter_mut().filter(|p| p.name == name) {
            patch
                .options
                .insert(assignment.key.clone(), assignment.value.clone());
            applied = true;
        }

        if !applied {
            if bundle.by_name(&name).next().is_none() {
                notices.push(format!(
                    "option '{}' targets unknown patch '{}'",
                    assignment.key, name
                ));
            } else {
                notices.push(format!(
                    "option '{}' targets patch '{}', which is not in the resolved set",
                    assignment.key, name
                ));
            }
        }
    }

    notices
}
