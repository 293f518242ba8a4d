//! CLI subcommand argument definitions for postbrand.

pub mod init;
pub mod run;
pub mod settings;

use clap::Args;

/// Arguments for the `init` subcommand.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,

    /// Skip the interactive wizard and write a default configuration.
    #[arg(long)]
    pub non_interactive: bool,
}

/// Arguments for the `run` subcommand.
#[derive(Debug, Args)]
pub struct RunArgs;

/// Arguments for the `settings` subcommand.
#[derive(Debug, Args)]
pub struct SettingsArgs {
    /// Show current configuration (read-only); this is also the default
    /// action when no other flag is given.
    #[arg(long)]
    pub show: bool,

    /// Set a config value directly (e.g., --set pipeline.similarity_threshold=0.85).
    #[arg(long)]
    pub set: Option<String>,

    /// Print configuration as JSON with secrets redacted.
    #[arg(long)]
    pub json: bool,
}
