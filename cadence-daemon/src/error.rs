use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Orchestrator(#[from] cadence_core::OrchestratorError),

    #[error(transparent)]
    Sync(#[from] cadence_sync::SyncError),

    #[error("malformed control message: {0}")]
    Json(#[from] serde_json::Error),

    /// The other end of an internal channel is gone; the owning task exits.
    #[error("{0} closed")]
    ChannelClosed(&'static str),

    #[error("daemon rejected {command}: {message}")]
    Rejected { command: &'static str, message: String },

    #[error("control protocol: {0}")]
    Protocol(String),

    #[error("another daemon is listening on {socket}")]
    SocketInUse { socket: PathBuf },

    #[error("signal handler failed: {0}")]
    Signal(#[source] std::io::Error),

    #[error("{task} task panicked or was cancelled: {message}")]
    Join { task: &'static str, message: String },

    #[error("daemon is not running (no listener on {socket})")]
    NotRunning { socket: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io { path: path.into(), source }
}
