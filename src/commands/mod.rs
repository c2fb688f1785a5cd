//! Command implementations for the repatch CLI

pub mod completions;
pub mod devices;
pub mod install;
pub mod list_patches;
pub mod monitor;
pub mod patch;
pub mod version;
