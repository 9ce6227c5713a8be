//! # cadence-sync
//!
//! Snapshot building, change-detecting atomic writes, validation and reload.
//!
//! [`Reconciler::run_cycle`] runs one full reconciliation: list applications,
//! filter, render, write only if the bytes differ, reload only if written.

pub mod command;
pub mod diff;
pub mod error;
pub mod pipeline;
pub mod reload;
pub mod snapshot;
pub mod writer;

pub use command::CommandSpec;
pub use diff::{diff_artifact, ArtifactDiff};
pub use error::{Stage, SyncError};
pub use pipeline::{CycleReport, Reconciler, ReconcilerSettings};
pub use reload::{CommandReloader, Reloader};
pub use writer::{write_artifact, WriteResult};
