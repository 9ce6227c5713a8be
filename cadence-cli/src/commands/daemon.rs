//! `cadence daemon`: run the reconciliation loop or talk to a running one.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use cadence_daemon::{request_status, request_stop, request_sync, start_blocking, DaemonError};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (watcher + scheduler + socket server).
    Start,
    /// Request graceful shutdown over the Unix socket.
    Stop,
    /// Query daemon status over the Unix socket.
    Status,
    /// Ask the daemon to reconcile at its next tick.
    Sync,
}

pub fn run(command: DaemonCommand, config_path: Option<&Path>) -> Result<()> {
    let (home, config) = super::load(config_path)?;
    let socket = config.socket_path_at(&home);

    match command {
        DaemonCommand::Start => {
            start_blocking(config, &home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&socket) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::NotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request_status(&socket) {
            Ok(status) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(DaemonError::NotRunning { .. }) => {
                let payload = serde_json::json!({
                    "running": false,
                    "socket": socket.display().to_string(),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&payload)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Sync => {
            let ack = request_sync(&socket).context("failed to request sync")?;
            if ack.coalesced {
                println!("sync already pending; request coalesced");
            } else {
                println!("sync queued for next tick");
            }
        }
    }

    Ok(())
}
