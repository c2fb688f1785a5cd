//! Build pipeline
//!
//! Strictly sequential state machine over the pipeline stages: optional
//! container conversion, patch application, artifact rebuild, signing,
//! optional device install. Failure isolation differs per level: an
//! individual patch failure is recorded and consumption continues; a stage
//! failure is recorded and aborts the remaining stages. Every executed
//! stage lands in the report before its error propagates, so callers get
//! both the structured report and a failing exit.

pub mod convert;
pub mod report;
pub mod sign;

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::adb::bridge::{AdbBridge, InstallRequest};
use crate::engine::{ApplyJob, PatchEngine, PatchEvent, write_selection};
use crate::error::{RepatchError, Result};
use crate::hash;
use crate::selection::{PackageTarget, SelectedPatch};
use crate::temp;

use report::{PatchingReport, ReportBuilder, Stage};
use sign::SigningConfig;

/// What one pipeline run produces and consumes
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// `None` skips the sign stage (unsigned or mount-install output)
    pub signing: Option<SigningConfig>,
    /// `None` skips the install stage
    pub install: Option<InstallRequest>,
}

/// Progress callbacks, so the CLI can drive a terminal display without the
/// pipeline knowing about terminals
pub trait PipelineObserver {
    fn stage_started(&self, stage: Stage);
    fn stage_finished(&self, stage: Stage, success: bool);
    fn patch_finished(&self, event: &PatchEvent);
}

/// Observer that ignores everything
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn stage_started(&self, _stage: Stage) {}
    fn stage_finished(&self, _stage: Stage, _success: bool) {}
    fn patch_finished(&self, _event: &PatchEvent) {}
}

/// The report plus the stage error that aborted the run, if any.
///
/// Per-patch failures downgrade the report without setting `error`; the
/// caller decides the process exit from both.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub report: PatchingReport,
    pub error: Option<RepatchError>,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.report.success
    }
}

/// Run the pipeline over an already-resolved selection.
///
/// Cancellation is cooperative: checked between stages and between
/// individual patch events. A cancelled run keeps the report's partial
/// state; the workdir is released on drop and nothing else is cleaned up.
pub async fn run<E: PatchEngine>(
    engine: &E,
    bridge: &AdbBridge,
    config: &PipelineConfig,
    target: &PackageTarget,
    selection: &[SelectedPatch],
    cancel: &CancellationToken,
    observer: &dyn PipelineObserver,
) -> PipelineOutcome {
    let mut report = ReportBuilder::new(target);

    let workdir = match temp::create_workdir(&config.input) {
        Ok(workdir) => workdir,
        Err(e) => return abort(report, e),
    };

    if cancel.is_cancelled() {
        return abort(report, RepatchError::Cancelled);
    }

    // convert-container: plain APK inputs skip this stage entirely
    let mut working = config.input.clone();
    if convert::is_container(&config.input) {
        observer.stage_started(Stage::ConvertContainer);
        match convert::merge_container(&config.input, workdir.path()).await {
            Ok(merged) => {
                report.record_stage(Stage::ConvertContainer, true, None);
                observer.stage_finished(Stage::ConvertContainer, true);
                working = merged;
            }
            Err(e) => {
                report.record_stage(Stage::ConvertContainer, false, Some(e.to_string()));
                observer.stage_finished(Stage::ConvertContainer, false);
                return abort(report, e);
            }
        }
    }

    if cancel.is_cancelled() {
        return abort(report, RepatchError::Cancelled);
    }

    // apply-patches: one bad patch never prevents the others from running
    observer.stage_started(Stage::ApplyPatches);
    let changes = workdir.path().join("changes");
    if let Err(e) = tokio::fs::create_dir_all(&changes).await {
        let e = RepatchError::from(e);
        report.record_stage(Stage::ApplyPatches, false, Some(e.to_string()));
        observer.stage_finished(Stage::ApplyPatches, false);
        return abort(report, e);
    }

    match apply_patches(engine, &working, &changes, selection, cancel, &mut report, observer).await
    {
        Ok(applied) => {
            let message = format!("{applied} of {} patches applied", selection.len());
            report.record_stage(Stage::ApplyPatches, true, Some(message));
            observer.stage_finished(Stage::ApplyPatches, true);
        }
        Err(e) => {
            report.record_stage(Stage::ApplyPatches, false, Some(e.to_string()));
            observer.stage_finished(Stage::ApplyPatches, false);
            return abort(report, e);
        }
    }

    if cancel.is_cancelled() {
        return abort(report, RepatchError::Cancelled);
    }

    // rebuild-artifact: accumulated changes onto a fresh copy of the input
    observer.stage_started(Stage::RebuildArtifact);
    let rebuilt = workdir.path().join("rebuilt.apk");
    match engine.build(&working, &changes, &rebuilt).await {
        Ok(()) => {
            report.record_stage(Stage::RebuildArtifact, true, None);
            observer.stage_finished(Stage::RebuildArtifact, true);
        }
        Err(e) => {
            report.record_stage(Stage::RebuildArtifact, false, Some(e.to_string()));
            observer.stage_finished(Stage::RebuildArtifact, false);
            return abort(report, e);
        }
    }

    if cancel.is_cancelled() {
        return abort(report, RepatchError::Cancelled);
    }

    // sign-artifact, or a plain copy for unsigned output
    match &config.signing {
        Some(signing) => {
            observer.stage_started(Stage::SignArtifact);
            match sign::sign_artifact(&rebuilt, &config.output, signing, workdir.path()).await {
                Ok(()) => {
                    report.record_stage(Stage::SignArtifact, true, None);
                    observer.stage_finished(Stage::SignArtifact, true);
                }
                Err(e) => {
                    report.record_stage(Stage::SignArtifact, false, Some(e.to_string()));
                    observer.stage_finished(Stage::SignArtifact, false);
                    return abort(report, e);
                }
            }
        }
        None => {
            if let Err(e) = tokio::fs::copy(&rebuilt, &config.output).await {
                return abort(report, RepatchError::from(e));
            }
        }
    }

    report.set_output(
        config.output.clone(),
        hash::hash_file(&config.output).ok(),
    );

    if cancel.is_cancelled() {
        return abort(report, RepatchError::Cancelled);
    }

    // install: failure here never invalidates the artifact already built
    if let Some(request) = &config.install {
        observer.stage_started(Stage::Install);
        match bridge.install(&config.output, request).await {
            Ok(device) => {
                report.record_stage(
                    Stage::Install,
                    true,
                    Some(format!("installed to {}", device.label())),
                );
                observer.stage_finished(Stage::Install, true);
            }
            Err(e) => {
                report.record_stage(Stage::Install, false, Some(e.to_string()));
                observer.stage_finished(Stage::Install, false);
                return abort(report, e);
            }
        }
    }

    // Cleanup failure is logged, never escalated
    if let Err(e) = workdir.close() {
        eprintln!("warning: failed to remove workdir: {e}");
    }

    PipelineOutcome {
        report: report.finish(),
        error: None,
    }
}

/// Consume the engine's event stream to completion; returns the number of
/// patches that applied cleanly
async fn apply_patches<E: PatchEngine>(
    engine: &E,
    artifact: &std::path::Path,
    changes: &std::path::Path,
    selection: &[SelectedPatch],
    cancel: &CancellationToken,
    report: &mut ReportBuilder,
    observer: &dyn PipelineObserver,
) -> Result<usize> {
    let selection_path = changes.with_file_name("selection.json");
    write_selection(&selection_path, selection).await?;

    let job = ApplyJob {
        artifact: artifact.to_path_buf(),
        selection: selection_path,
        changes: changes.to_path_buf(),
    };
    let mut stream = engine.apply(&job).await?;
    let mut applied = 0;

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RepatchError::Cancelled),
            event = stream.next() => event,
        };
        let Some(event) = event else {
            break;
        };

        observer.patch_finished(&event);
        if event.success {
            let options = selection
                .iter()
                .find(|p| p.name == event.name)
                .map(|p| p.options.clone())
                .unwrap_or_default();
            report.record_patch_success(&event.name, options);
            applied += 1;
        } else {
            report.record_patch_failure(&event.name, event.error.clone());
        }
    }

    stream.finish().await?;
    Ok(applied)
}

fn abort(report: ReportBuilder, error: RepatchError) -> PipelineOutcome {
    PipelineOutcome {
        report: report.finish(),
        error: Some(error),
    }
}
