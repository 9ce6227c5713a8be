//! Error types for cadence-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can arise while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load, with the offending file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`, so `~/.cadence/` cannot be located.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// The file parsed but a value is unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures of the orchestrator capability.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// Connection refused, DNS failure, TLS failure...
    #[error("orchestrator unreachable: {0}")]
    Transport(String),

    /// The orchestrator answered with a non-success status.
    #[error("orchestrator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("malformed orchestrator response: {0}")]
    Decode(String),

    /// The event stream broke mid-flight.
    #[error("event stream error: {0}")]
    Stream(String),

    #[error("orchestrator call timed out after {0:?}")]
    Timeout(Duration),
}
