//! repatch - command line patcher for Android application packages
//!
//! Selects patches from bundles, applies them through an external patch
//! engine, rebuilds and signs the artifact, and optionally installs it to a
//! connected device over adb.

use clap::Parser;

mod adb;
mod artifact;
mod bundle;
mod cli;
mod commands;
mod engine;
mod error;
mod hash;
mod pipeline;
mod progress;
mod selection;
mod temp;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let result = match cli.command {
        Commands::Patch(args) => commands::patch::run(args, verbose).await,
        Commands::ListPatches(args) => commands::list_patches::run(args, verbose).await,
        Commands::Devices => commands::devices::run().await,
        Commands::Install(args) => commands::install::run(args).await,
        Commands::Monitor(args) => commands::monitor::run(args).await,
        Commands::Version => commands::version::run(),
        Commands::Completions(args) => commands::completions::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
