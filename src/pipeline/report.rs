//! Patching report aggregation
//!
//! Pure bookkeeping: stage outcomes append in execution order, per-patch
//! outcomes append as they stream in, and overall success only ever
//! downgrades. The finished report serializes to JSON for automation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::selection::PackageTarget;

/// One phase of the build pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    ConvertContainer,
    ApplyPatches,
    RebuildArtifact,
    SignArtifact,
    Install,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ConvertContainer => "convert-container",
            Stage::ApplyPatches => "apply-patches",
            Stage::RebuildArtifact => "rebuild-artifact",
            Stage::SignArtifact => "sign-artifact",
            Stage::Install => "install",
        };
        write!(f, "{name}")
    }
}

/// Result of one executed stage
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A patch that applied cleanly, with its bound option values
#[derive(Debug, Clone, Serialize)]
pub struct AppliedPatch {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, Value>,
}

/// A patch that failed, with the engine's failure detail
#[derive(Debug, Clone, Serialize)]
pub struct FailedPatch {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The produced artifact, recorded once the rebuild lands
#[derive(Debug, Clone, Serialize)]
pub struct OutputArtifact {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Complete result of one patching operation
#[derive(Debug, Clone, Serialize)]
pub struct PatchingReport {
    pub package_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_version: Option<String>,
    pub success: bool,
    pub stages: Vec<StageOutcome>,
    pub applied: Vec<AppliedPatch>,
    pub failed: Vec<FailedPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputArtifact>,
}

/// Incremental report builder. Success starts `true` and is monotonically
/// downgraded by any failed outcome; nothing ever upgrades it back.
#[derive(Debug)]
pub struct ReportBuilder {
    report: PatchingReport,
}

impl ReportBuilder {
    pub fn new(target: &PackageTarget) -> Self {
        Self {
            report: PatchingReport {
                package_name: target.package.clone(),
                package_version: target.version.clone(),
                success: true,
                stages: Vec::new(),
                applied: Vec::new(),
                failed: Vec::new(),
                output: None,
            },
        }
    }

    pub fn record_stage(&mut self, stage: Stage, success: bool, message: Option<String>) {
        self.report.stages.push(StageOutcome {
            stage,
            success,
            message,
        });
        self.report.success &= success;
    }

    pub fn record_patch_success(&mut self, name: &str, options: BTreeMap<String, Value>) {
        self.report.applied.push(AppliedPatch {
            name: name.to_string(),
            options,
        });
    }

    pub fn record_patch_failure(&mut self, name: &str, detail: Option<String>) {
        self.report.failed.push(FailedPatch {
            name: name.to_string(),
            detail,
        });
        self.report.success = false;
    }

    pub fn set_output(&mut self, path: PathBuf, digest: Option<String>) {
        self.report.output = Some(OutputArtifact { path, digest });
    }

    pub fn is_success(&self) -> bool {
        self.report.success
    }

    pub fn finish(self) -> PatchingReport {
        self.report
    }
}
