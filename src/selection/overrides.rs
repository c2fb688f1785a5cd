//! Caller-supplied selection overrides
//!
//! Overrides arrive as repeatable CLI flags (enable/disable, by name or by
//! index) plus option assignments of the form `PATCH:KEY=VALUE`. They are
//! collected into one immutable [`OverrideSet`] before resolution; index
//! references always point into the combined bundle ordering as loaded.

use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use crate::bundle::LoadedPatch;
use crate::error::{RepatchError, Result};

/// Reference to a patch, by name or by combined-bundle index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSelector {
    Name(String),
    Index(usize),
}

impl PatchSelector {
    fn parse(input: &str) -> Self {
        match input.parse::<usize>() {
            Ok(index) => PatchSelector::Index(index),
            Err(_) => PatchSelector::Name(input.to_string()),
        }
    }

    fn matches(&self, patch: &LoadedPatch) -> bool {
        match self {
            PatchSelector::Name(name) => patch.definition.name == *name,
            PatchSelector::Index(index) => patch.index == *index,
        }
    }
}

/// One option assignment carried by an enable override
#[derive(Debug, Clone)]
pub struct OptionAssignment {
    pub target: PatchSelector,
    pub key: String,
    /// Carried opaquely; a bare key binds null
    pub value: Value,
}

/// The complete set of caller overrides for one resolution call
#[derive(Debug, Clone, Default)]
pub struct OverrideSet {
    enabled_names: HashSet<String>,
    enabled_indexes: BTreeSet<usize>,
    disabled_names: HashSet<String>,
    disabled_indexes: BTreeSet<usize>,
    options: Vec<OptionAssignment>,
}

impl OverrideSet {
    /// Build from repeatable CLI flags. Option assignments use
    /// `PATCH:KEY=VALUE` or `PATCH:KEY` (null value), where PATCH is a patch
    /// name or index.
    pub fn from_flags(
        enable: &[String],
        enable_index: &[usize],
        disable: &[String],
        disable_index: &[usize],
        options: &[String],
    ) -> Result<Self> {
        let mut set = OverrideSet {
            enabled_names: enable.iter().cloned().collect(),
            enabled_indexes: enable_index.iter().copied().collect(),
            disabled_names: disable.iter().cloned().collect(),
            disabled_indexes: disable_index.iter().copied().collect(),
            options: Vec::new(),
        };

        for raw in options {
            set.options.push(parse_option_assignment(raw)?);
        }

        Ok(set)
    }

    /// Fail fast on index references beyond the combined bundle length
    pub fn validate(&self, patch_count: usize) -> Result<()> {
        let indexes = self
            .enabled_indexes
            .iter()
            .chain(self.disabled_indexes.iter())
            .copied()
            .chain(self.options.iter().filter_map(|o| match o.target {
                PatchSelector::Index(i) => Some(i),
                PatchSelector::Name(_) => None,
            }));

        for index in indexes {
            if index >= patch_count {
                return Err(RepatchError::PatchIndexOutOfRange {
                    index,
                    count: patch_count,
                });
            }
        }
        Ok(())
    }

    /// Disabling wins over enabling for the same identity
    pub fn is_disabled(&self, patch: &LoadedPatch) -> bool {
        self.disabled_names.contains(&patch.definition.name)
            || self.disabled_indexes.contains(&patch.index)
    }

    pub fn is_enabled(&self, patch: &LoadedPatch) -> bool {
        self.enabled_names.contains(&patch.definition.name)
            || self.enabled_indexes.contains(&patch.index)
    }

    pub fn assignments(&self) -> &[OptionAssignment] {
        &self.options
    }

    /// Option assignments targeting `patch`, in flag order
    pub fn options_for<'a>(
        &'a self,
        patch: &'a LoadedPatch,
    ) -> impl Iterator<Item = &'a OptionAssignment> {
        self.options.iter().filter(|o| o.target.matches(patch))
    }
}

fn parse_option_assignment(raw: &str) -> Result<OptionAssignment> {
    let Some((target, rest)) = raw.split_once(':') else {
        return Err(RepatchError::InvalidOptionAssignment {
            value: raw.to_string(),
            reason: "missing ':' between patch and option".to_string(),
        });
    };

    if target.is_empty() {
        return Err(RepatchError::InvalidOptionAssignment {
            value: raw.to_string(),
            reason: "empty patch reference".to_string(),
        });
    }

    let (key, value) = match rest.split_once('=') {
        Some((key, value)) => (key, Value::String(value.to_string())),
        None => (rest, Value::Null),
    };

    if key.is_empty() {
        return Err(RepatchError::InvalidOptionAssignment {
            value: raw.to_string(),
            reason: "empty option key".to_string(),
        });
    }

    Ok(OptionAssignment {
        target: PatchSelector::parse(target),
        key: key.to_string(),
        value,
    })
}
