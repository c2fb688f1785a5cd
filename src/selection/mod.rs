//! Patch selection: override collection, compatibility resolution, option binding

pub mod binder;
pub mod overrides;
pub mod resolver;

pub use overrides::{OverrideSet, PatchSelector};
pub use resolver::{ExclusionReason, PackageTarget, Resolution, SelectedPatch, resolve};
