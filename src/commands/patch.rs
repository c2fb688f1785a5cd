//! Patch command implementation

use std::path::{Path, PathBuf};

use console::Style;
use tokio_util::sync::CancellationToken;

use crate::adb::bridge::{AdbBridge, InstallMode, InstallRequest};
use crate::artifact;
use crate::bundle;
use crate::cli::PatchArgs;
use crate::engine::external::ExternalEngine;
use crate::error::{RepatchError, Result};
use crate::pipeline::report::PatchingReport;
use crate::pipeline::sign::SigningConfig;
use crate::pipeline::{self, PipelineConfig};
use crate::progress::ProgressDisplay;
use crate::selection::{OverrideSet, binder, resolve};

/// Run the patch command
pub async fn run(args: PatchArgs, verbose: bool) -> Result<()> {
    // Configuration errors fail fast, before any stage runs
    let engine_path = args.engine.clone().ok_or(RepatchError::EngineNotConfigured)?;
    let overrides = OverrideSet::from_flags(
        &args.enable,
        &args.enable_index,
        &args.disable,
        &args.disable_index,
        &args.options,
    )?;

    let bundle = bundle::load_bundles(&args.bundle).await?;
    overrides.validate(bundle.len())?;

    let target =
        artifact::inspect(&args.input, args.package.clone(), args.package_version.clone()).await?;

    let mut resolution = resolve(&bundle, &target, &overrides, args.exclusive, args.force)?;
    if verbose {
        for excluded in &resolution.excluded {
            eprintln!("  skipping {}: {}", excluded.name, excluded.reason);
        }
    }
    if resolution.selected.is_empty() {
        return Err(RepatchError::EmptySelection {
            package: target.package.clone(),
        });
    }

    for notice in binder::bind(&mut resolution, &bundle, &overrides) {
        if verbose {
            eprintln!("  {notice}");
        }
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));
    let config = PipelineConfig {
        input: args.input.clone(),
        output,
        signing: if args.unsigned || args.mount {
            None
        } else {
            Some(SigningConfig::new(
                args.keystore.clone(),
                args.keystore_pass.clone(),
                args.key_alias.clone(),
            ))
        },
        install: args.device.clone().map(|serial| InstallRequest {
            serial: (!serial.is_empty()).then_some(serial),
            mode: if args.mount {
                InstallMode::Mount {
                    package: target.package.clone(),
                }
            } else {
                InstallMode::Copy
            },
            allow_downgrade: args.allow_downgrade,
        }),
    };

    println!(
        "Patching {} {} with {} patch(es)",
        Style::new().bold().apply_to(&target.package),
        target.version.as_deref().unwrap_or("(unknown version)"),
        resolution.selected.len()
    );

    // Ctrl-C cancels cooperatively, between stages and between patch events
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let engine = ExternalEngine::new(engine_path);
    let bridge = AdbBridge::locate();
    let progress = ProgressDisplay::new(resolution.selected.len() as u64);

    let outcome = pipeline::run(
        &engine,
        &bridge,
        &config,
        &target,
        &resolution.selected,
        &cancel,
        &progress,
    )
    .await;

    if outcome.is_success() {
        progress.finish();
    } else {
        progress.abandon();
    }

    if let Some(path) = &args.report {
        write_report(path, &outcome.report).await?;
    }
    print_summary(&outcome.report, verbose);

    // The report has the bookkeeping; the process still has to fail
    if let Some(error) = outcome.error {
        return Err(error);
    }
    if !outcome.report.success {
        return Err(RepatchError::PartialFailure {
            failed: outcome.report.failed.len(),
        });
    }
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}-patched.apk"))
}

async fn write_report(path: &Path, report: &PatchingReport) -> Result<()> {
    let json =
        serde_json::to_string_pretty(report).map_err(|e| RepatchError::ReportWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| RepatchError::ReportWriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

fn print_summary(report: &PatchingReport, verbose: bool) {
    println!();
    if report.success {
        println!(
            "{} {} patch(es) applied",
            Style::new().green().bold().apply_to("Success:"),
            report.applied.len()
        );
    } else {
        println!(
            "{} {} applied, {} failed",
            Style::new().red().bold().apply_to("Failed:"),
            report.applied.len(),
            report.failed.len()
        );
    }

    for patch in &report.failed {
        println!(
            "  {} {}: {}",
            Style::new().red().apply_to("✗"),
            patch.name,
            patch.detail.as_deref().unwrap_or("no detail")
        );
    }

    if verbose {
        for stage in &report.stages {
            let mark = if stage.success {
                Style::new().green().apply_to("✓")
            } else {
                Style::new().red().apply_to("✗")
            };
            match &stage.message {
                Some(message) => println!("  {mark} {}: {message}", stage.stage),
                None => println!("  {mark} {}", stage.stage),
            }
        }
    }

    if let Some(output) = &report.output {
        println!(
            "{} {}",
            Style::new().bold().apply_to("Output:"),
            output.path.display()
        );
    }
}
