//! Reload trigger: tells the proxy to pick up the new artifact.

use async_trait::async_trait;
use chrono::Utc;

use cadence_core::config::NginxConfig;

use crate::command::{stderr_text, CommandSpec};
use crate::error::{Stage, SyncError};

/// Something that makes the proxy re-read its configuration.
///
/// Called only after the artifact changed. No retry happens here; a failed
/// reload is retried by the next cycle that changes the artifact.
#[async_trait]
pub trait Reloader: Send + Sync {
    async fn reload(&self) -> Result<(), SyncError>;
}

/// Runs `reload_command`; a zero exit is success.
#[derive(Debug, Clone)]
pub struct CommandReloader {
    command: CommandSpec,
}

impl CommandReloader {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }

    pub fn from_config(nginx: &NginxConfig) -> Self {
        Self::new(CommandSpec::new(
            nginx.reload_command.clone(),
            nginx.reload_timeout(),
        ))
    }
}

#[async_trait]
impl Reloader for CommandReloader {
    async fn reload(&self) -> Result<(), SyncError> {
        let started = Utc::now();
        let output = self.command.output(Stage::Reload, None).await?;
        if !output.status.success() {
            return Err(SyncError::Reload {
                command: self.command.display(),
                status: output.status.code(),
                stderr: stderr_text(&output),
            });
        }
        let elapsed = Utc::now() - started;
        tracing::info!(
            "reloaded via `{}` in {}ms",
            self.command.display(),
            elapsed.num_milliseconds()
        );
        Ok(())
    }
}
