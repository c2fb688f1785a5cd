//! Serde types for the patches.json bundle manifest

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One patch definition as serialized in a bundle manifest
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatchDefinition {
    /// Patch name, unique within a bundle
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,

    /// Declared compatibility entries.
    ///
    /// `None` means the patch is universal: eligible for any package and
    /// version unless excluded by the caller. An entry whose version list is
    /// `None` supports any version of that package; an entry whose version
    /// list is empty supports no version at all.
    #[serde(default)]
    pub compatible_packages: Option<Vec<CompatibleEntry>>,

    /// Options declared by the patch
    #[serde(default)]
    pub options: Vec<OptionDefinition>,

    /// Whether the patch runs without an explicit enable override
    #[serde(default = "default_enabled", rename = "enabled")]
    pub default_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A (package, version list) compatibility declaration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompatibleEntry {
    pub package: String,

    /// Supported versions. `None` = any version, `Some([])` = no version.
    #[serde(default)]
    pub versions: Option<Vec<String>>,
}

/// A declared patch option
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptionDefinition {
    pub key: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(rename = "type", default)]
    pub value_type: OptionType,

    /// Default value, carried opaquely
    #[serde(default)]
    pub default: Value,

    #[serde(default)]
    pub required: bool,
}

/// Type tag of a declared option.
///
/// The tag is metadata for display and for the engine; repatch never coerces
/// option values itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    String,
    Bool,
    Int,
    Long,
    Float,
    List,
}

impl PatchDefinition {
    /// Default option values keyed by option key, skipping null defaults
    pub fn default_options(&self) -> BTreeMap<String, Value> {
        self.options
            .iter()
            .filter(|o| !o.default.is_null())
            .map(|o| (o.key.clone(), o.default.clone()))
            .collect()
    }

    /// The compatibility entries declared for `package`
    pub fn entries_for<'a>(&'a self, package: &str) -> Vec<&'a CompatibleEntry> {
        self.compatible_packages
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|e| e.package == package)
            .collect()
    }

    /// Whether the patch declares no compatibility entries at all
    pub fn is_universal(&self) -> bool {
        self.compatible_packages
            .as_deref()
            .is_none_or(|entries| entries.is_empty())
    }
}
