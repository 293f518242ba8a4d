//! postbrand CLI — daemon entry point and operator tooling.
//!
//! Parses arguments, initializes logging, and dispatches to subcommand
//! handlers. `run` is the only long-lived command; `init` and `settings`
//! manage the config file lifecycle and exit.
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// postbrand — semi-automatic posting daemon for a single brand.
#[derive(Parser)]
#[command(name = "postbrand")]
#[command(version)]
#[command(about = "Semi-automatic social posting daemon")]
#[command(after_help = "\
Quick start:
  1. postbrand init       — interactive setup wizard
  2. postbrand settings   — review or adjust configuration
  3. postbrand run        — start the daemon")]
struct Cli {
    /// Path to config.toml.
    #[arg(short = 'c', long, global = true, default_value = "~/.postbrand/config.toml")]
    config: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Set up configuration (interactive wizard)
    Init(commands::InitArgs),
    /// Start the daemon in-process — workers, scheduler, HTTP server
    Run(commands::RunArgs),
    /// Inspect or edit the running configuration
    Settings(commands::SettingsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("postbrand=debug,postbrand_core=debug,postbrand_server=debug,info")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::new("postbrand=info,postbrand_core=info,postbrand_server=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose)
        .compact()
        .init();

    match cli.command {
        Commands::Init(args) => commands::init::execute(&cli.config, args.force, args.non_interactive).await,
        Commands::Settings(args) => commands::settings::execute(&cli.config, args).await,
        Commands::Run(_) => commands::run::execute(&cli.config).await,
    }
}
