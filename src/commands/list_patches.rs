//! List-patches command implementation

use std::collections::BTreeSet;

use console::Style;

use crate::bundle::{self, LoadedPatch};
use crate::cli::ListPatchesArgs;
use crate::error::Result;
use crate::selection::{ExclusionReason, OverrideSet, PackageTarget, resolve};

/// Run the list-patches command
pub async fn run(args: ListPatchesArgs, verbose: bool) -> Result<()> {
    let bundle = bundle::load_bundles(&args.bundle).await?;

    // With a package filter, keep the patches that pass the compatibility
    // check for it (enabled or not)
    let compatible: Option<BTreeSet<usize>> = match &args.package {
        Some(package) => {
            let target = PackageTarget {
                package: package.clone(),
                version: args.package_version.clone(),
            };
            let resolution = resolve(&bundle, &target, &OverrideSet::default(), false, false)?;
            Some(
                resolution
                    .selected
                    .iter()
                    .map(|p| p.index)
                    .chain(
                        resolution
                            .excluded
                            .iter()
                            .filter(|e| e.reason == ExclusionReason::NotSelected)
                            .map(|e| e.index),
                    )
                    .collect(),
            )
        }
        None => None,
    };

    let mut shown = 0;
    for patch in &bundle.patches {
        if let Some(compatible) = &compatible {
            if !compatible.contains(&patch.index) {
                continue;
            }
        }
        print_patch(patch, &args, verbose);
        shown += 1;
    }

    if shown == 0 {
        match &args.package {
            Some(package) => println!("No patches compatible with {package}"),
            None => println!("No patches in bundle"),
        }
    }

    Ok(())
}

fn print_patch(patch: &LoadedPatch, args: &ListPatchesArgs, verbose: bool) {
    let definition = &patch.definition;
    let flag = if definition.default_enabled {
        Style::new().green().apply_to("enabled")
    } else {
        Style::new().dim().apply_to("disabled")
    };
    println!(
        "{:>3}  {} [{flag}]",
        patch.index,
        Style::new().bold().yellow().apply_to(&definition.name)
    );

    if let Some(description) = &definition.description {
        println!("     {description}");
    }
    if verbose {
        println!("     {} {}", Style::new().dim().apply_to("from"), patch.bundle.display());
    }

    if args.with_versions {
        match definition.compatible_packages.as_deref() {
            None | Some([]) => println!("     any package"),
            Some(entries) => {
                for entry in entries {
                    match entry.versions.as_deref() {
                        None => println!("     {}: any version", entry.package),
                        Some([]) => println!("     {}: no supported version", entry.package),
                        Some(versions) => {
                            println!("     {}: {}", entry.package, versions.join(", "));
                        }
                    }
                }
            }
        }
    }

    if args.with_options && !definition.options.is_empty() {
        println!("     {}", Style::new().bold().apply_to("Options:"));
        for option in &definition.options {
            let required = if option.required { " (required)" } else { "" };
            match &option.title {
                Some(title) => println!("       {}: {title}{required}", option.key),
                None => println!("       {}{required}", option.key),
            }
            if !option.default.is_null() {
                println!("         default: {}", option.default);
            }
        }
    }
}
