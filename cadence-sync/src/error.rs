//! Error types for cadence-sync.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use cadence_core::OrchestratorError;
use cadence_renderer::RenderError;

/// Where in a reconciliation cycle a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Listing applications from the orchestrator. Nothing was mutated.
    Fetch,
    /// Rendering, validating or promoting the artifact. The previous
    /// artifact is still on disk.
    Write,
    /// Running the reload action. The new artifact stays written.
    Reload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => f.write_str("fetch"),
            Stage::Write => f.write_str("write"),
            Stage::Reload => f.write_str("reload"),
        }
    }
}

/// All errors that can arise from a reconciliation cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] OrchestratorError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The validate command rejected the candidate artifact.
    #[error("validation `{command}` failed ({}): {stderr}", exit_label(.status))]
    Validation {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("reload `{command}` failed ({}): {stderr}", exit_label(.status))]
    Reload {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The command could not be started at all.
    #[error("could not run `{command}` during {stage}: {source}")]
    Spawn {
        stage: Stage,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },
}

impl SyncError {
    pub fn stage(&self) -> Stage {
        match self {
            SyncError::Fetch(_) => Stage::Fetch,
            SyncError::Render(_) | SyncError::Io { .. } | SyncError::Validation { .. } => {
                Stage::Write
            }
            SyncError::Reload { .. } => Stage::Reload,
            SyncError::Spawn { stage, .. } | SyncError::Timeout { stage, .. } => *stage,
        }
    }
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
