//! Cadence core library: domain types, eligibility filter, orchestrator
//! capability, status register, configuration.
//!
//! - [`types`]: orchestrator wire model and the snapshot model
//! - [`eligibility`]: which tasks are serviceable; snapshot construction
//! - [`orchestrator`]: the [`Orchestrator`] trait and change events
//! - [`status`]: [`StatusTracker`] and [`SnapshotHandle`]
//! - [`config`]: YAML configuration loading
//! - [`error`]: [`ConfigError`], [`OrchestratorError`]

pub mod config;
pub mod eligibility;
pub mod error;
pub mod orchestrator;
pub mod status;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, OrchestratorError};
pub use orchestrator::{ChangeEvent, EventStream, Orchestrator};
pub use status::{SnapshotHandle, Status, StatusTracker};
pub use types::{
    AppId, Application, AppsResponse, HealthCheckResult, Instance, Snapshot, Task, WorkloadGroup,
};
