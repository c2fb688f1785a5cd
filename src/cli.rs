//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// repatch - command line patcher for Android application packages
#[derive(Parser, Debug)]
#[command(
    name = "repatch",
    author,
    version,
    color = clap::ColorChoice::Always,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Patch Android application packages with patch bundles",
    long_about = "repatch selects patches from bundles, applies them through an external \
                  patch engine, rebuilds and signs the artifact, and optionally installs \
                  it to a connected device over adb.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  repatch patch app.apk --bundle patches.rpb\n    \
                  repatch patch app.apk --bundle patches.rpb --enable dark-theme --device\n    \
                  repatch list-patches --bundle patches.rpb\n    \
                  repatch devices\n\n\
                  \x1b[1m\x1b[32mDocumentation:\x1b[0m\n    \
                  https://github.com/repatch-tools/repatch"
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Patch an APK with the selected patches
    Patch(PatchArgs),

    /// List the patches of one or more bundles
    ListPatches(ListPatchesArgs),

    /// List connected devices
    Devices,

    /// Install an already-patched APK to a device
    Install(InstallArgs),

    /// Watch connected devices until interrupted
    Monitor(MonitorArgs),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the patch command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Patch with every default-enabled compatible patch:\n    repatch patch app.apk --bundle patches.rpb\n\n\
                  Enable an extra patch with an option:\n    repatch patch app.apk --bundle patches.rpb --enable custom-branding --options custom-branding:appName=MyApp\n\n\
                  Run only explicitly enabled patches:\n    repatch patch app.apk --bundle patches.rpb --exclusive --enable strip-ads\n\n\
                  Ignore version mismatches:\n    repatch patch app.apk --bundle patches.rpb --force\n\n\
                  Patch and install to the only connected device:\n    repatch patch app.apk --bundle patches.rpb --device\n\n\
                  Write the machine-readable report:\n    repatch patch app.apk --bundle patches.rpb --report report.json")]
pub struct PatchArgs {
    /// Input artifact (.apk, or a .apks/.xapk/.apkm container)
    pub input: PathBuf,

    /// Patch bundle (.rpb archive, patches.json file or bundle directory); repeatable
    #[arg(long, short = 'b', value_name = "BUNDLE", required = true)]
    pub bundle: Vec<PathBuf>,

    /// Patch engine executable (defaults to $REPATCH_ENGINE)
    #[arg(long, value_name = "PATH", env = "REPATCH_ENGINE")]
    pub engine: Option<PathBuf>,

    /// Target package name (skips aapt detection; required for containers)
    #[arg(long, value_name = "PACKAGE")]
    pub package: Option<String>,

    /// Target package version (with --package, skips aapt detection)
    #[arg(long, value_name = "VERSION")]
    pub package_version: Option<String>,

    /// Enable a patch by name; repeatable
    #[arg(long, short = 'e', value_name = "NAME")]
    pub enable: Vec<String>,

    /// Enable a patch by its combined-bundle index; repeatable
    #[arg(long, value_name = "INDEX")]
    pub enable_index: Vec<usize>,

    /// Disable a patch by name; repeatable
    #[arg(long, short = 'd', value_name = "NAME")]
    pub disable: Vec<String>,

    /// Disable a patch by its combined-bundle index; repeatable
    #[arg(long, value_name = "INDEX")]
    pub disable_index: Vec<usize>,

    /// Option assignment PATCH:KEY=VALUE (or PATCH:KEY for null); repeatable
    #[arg(long, short = 'O', value_name = "PATCH:KEY=VALUE")]
    pub options: Vec<String>,

    /// Run only explicitly enabled patches
    #[arg(long)]
    pub exclusive: bool,

    /// Ignore version-compatibility mismatches (package mismatch still enforced)
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Output path (defaults to <input>-patched.apk)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write the JSON patching report to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Skip signing
    #[arg(long)]
    pub unsigned: bool,

    /// Keystore path (default ~/.repatch/repatch.keystore, auto-generated)
    #[arg(long, value_name = "PATH")]
    pub keystore: Option<PathBuf>,

    /// Keystore password
    #[arg(long, value_name = "PASS")]
    pub keystore_pass: Option<String>,

    /// Signing key alias
    #[arg(long, value_name = "ALIAS")]
    pub key_alias: Option<String>,

    /// Install to a device after patching; empty SERIAL auto-picks the
    /// single ready device
    #[arg(long, value_name = "SERIAL", num_args = 0..=1, default_missing_value = "")]
    pub device: Option<String>,

    /// Mount the patched APK over the installed app instead of installing
    /// (rooted devices; skips signing)
    #[arg(long)]
    pub mount: bool,

    /// Pass allow-downgrade to the device installer
    #[arg(long)]
    pub allow_downgrade: bool,
}

/// Arguments for the list-patches command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  List every patch in a bundle:\n    repatch list-patches --bundle patches.rpb\n\n\
                  Show compatibility and options:\n    repatch list-patches --bundle patches.rpb --with-versions --with-options\n\n\
                  Only patches compatible with a package:\n    repatch list-patches --bundle patches.rpb --package com.example.app")]
pub struct ListPatchesArgs {
    /// Patch bundle (.rpb archive, patches.json file or bundle directory); repeatable
    #[arg(long, short = 'b', value_name = "BUNDLE", required = true)]
    pub bundle: Vec<PathBuf>,

    /// Only show patches compatible with this package
    #[arg(long, value_name = "PACKAGE")]
    pub package: Option<String>,

    /// With --package, also filter by this version
    #[arg(long, value_name = "VERSION")]
    pub package_version: Option<String>,

    /// Show supported versions per compatibility entry
    #[arg(long)]
    pub with_versions: bool,

    /// Show declared options
    #[arg(long)]
    pub with_options: bool,
}

/// Arguments for the install command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Install to the only connected device:\n    repatch install patched.apk\n\n\
                  Install to a specific device:\n    repatch install patched.apk --device emulator-5554\n\n\
                  Mount over the installed app (rooted):\n    repatch install patched.apk --mount --package com.example.app")]
pub struct InstallArgs {
    /// The APK to install
    pub artifact: PathBuf,

    /// Device serial (defaults to the single ready device)
    #[arg(long, value_name = "SERIAL")]
    pub device: Option<String>,

    /// Mount the APK over the installed app instead of installing (rooted
    /// devices)
    #[arg(long)]
    pub mount: bool,

    /// Package name of the installed app (required with --mount)
    #[arg(long, value_name = "PACKAGE", required_if_eq("mount", "true"))]
    pub package: Option<String>,

    /// Pass allow-downgrade to the device installer
    #[arg(long)]
    pub allow_downgrade: bool,
}

/// Arguments for the monitor command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Watch devices at the default 5s period:\n    repatch monitor\n\n\
                  Poll every second:\n    repatch monitor --interval 1")]
pub struct MonitorArgs {
    /// Refresh period in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 5)]
    pub interval: u64,
}

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    repatch completions --shell bash > ~/.bash_completion.d/repatch\n\n\
                  Generate zsh completions:\n    repatch completions --shell zsh > ~/.zfunc/_repatch\n\n\
                  Generate fish completions:\n    repatch completions --shell fish > ~/.config/fish/completions/repatch.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    #[arg(long)]
    pub shell: String,
}
