//! cadence: keeps a reverse-proxy configuration in step with Marathon.
//!
//! # Usage
//!
//! ```text
//! cadence [--config <path>] check-config
//! cadence [--config <path>] sync [--dry-run]
//! cadence [--config <path>] diff
//! cadence [--config <path>] daemon start|stop|status|sync
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "cadence",
    version,
    about = "Render reverse-proxy configuration from Marathon and reload on change",
    long_about = None,
)]
struct Cli {
    /// Config file (default: ~/.cadence/config.yaml).
    #[arg(long, global = true, env = "CADENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate the configuration, then print a summary.
    CheckConfig,

    /// Run one reconciliation cycle now, without the daemon.
    Sync(SyncArgs),

    /// Show the unified diff between the artifact on disk and what sync would write.
    Diff,

    /// Run or talk to the long-running reconciliation daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    match cli.command {
        Commands::CheckConfig => commands::check_config::run(config),
        Commands::Sync(args) => args.run(config),
        Commands::Diff => commands::diff::run(config),
        Commands::Daemon { command } => commands::daemon::run(command, config),
    }
}
