//! The reconciliation cycle shared by the CLI and the daemon.
//!
//! One cycle: build snapshot, render, write if changed, reload if written.
//! The first failing stage records its error in [`StatusTracker`] and ends
//! the cycle; a fully successful cycle clears any previous error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use cadence_core::{Config, Orchestrator, Snapshot, SnapshotHandle, StatusTracker};
use cadence_renderer::Renderer;

use crate::command::CommandSpec;
use crate::diff::{diff_artifact, ArtifactDiff};
use crate::error::SyncError;
use crate::reload::{CommandReloader, Reloader};
use crate::snapshot;
use crate::writer::{write_artifact, WriteResult};

/// Where the artifact goes and how long each stage may take.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub output: PathBuf,
    pub validate: Option<CommandSpec>,
    pub fetch_timeout: Duration,
}

impl ReconcilerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output: config.nginx.output.clone(),
            validate: config
                .nginx
                .validate_command
                .clone()
                .map(|argv| CommandSpec::new(argv, config.nginx.reload_timeout())),
            fetch_timeout: config.marathon.request_timeout(),
        }
    }
}

/// Summary of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub groups: usize,
    pub instances: usize,
    pub write: WriteResult,
    pub reloaded: bool,
    pub duration_ms: u128,
}

/// Owns everything one cycle needs. Cycles must not overlap; the daemon's
/// scheduler is the only caller in a long-running process.
pub struct Reconciler {
    orchestrator: Arc<dyn Orchestrator>,
    renderer: Renderer,
    reloader: Arc<dyn Reloader>,
    settings: ReconcilerSettings,
    status: StatusTracker,
    snapshot: SnapshotHandle,
}

impl Reconciler {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        renderer: Renderer,
        reloader: Arc<dyn Reloader>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            orchestrator,
            renderer,
            reloader,
            settings,
            status: StatusTracker::new(),
            snapshot: SnapshotHandle::new(),
        }
    }

    /// Wire up the embedded or configured template and the command reloader.
    pub fn from_config(
        config: &Config,
        orchestrator: Arc<dyn Orchestrator>,
    ) -> Result<Self, SyncError> {
        let renderer = Renderer::from_optional(config.nginx.template.as_deref())?;
        let reloader = Arc::new(CommandReloader::from_config(&config.nginx));
        Ok(Self::new(
            orchestrator,
            renderer,
            reloader,
            ReconcilerSettings::from_config(config),
        ))
    }

    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    pub fn snapshot(&self) -> &SnapshotHandle {
        &self.snapshot
    }

    pub fn output(&self) -> &Path {
        &self.settings.output
    }

    /// Run one full cycle and record its outcome in the status register.
    ///
    /// In dry-run mode nothing is written and the reload never runs.
    pub async fn run_cycle(&self, dry_run: bool) -> Result<CycleReport, SyncError> {
        let started = Instant::now();
        self.status.begin_cycle();
        match self.reconcile(dry_run, started).await {
            Ok(report) => {
                self.status.clear_error();
                tracing::info!(
                    "cycle ok: {} groups, {} instances, changed={}, reloaded={}, {}ms",
                    report.groups,
                    report.instances,
                    report.write.changed(),
                    report.reloaded,
                    report.duration_ms
                );
                Ok(report)
            }
            Err(err) => {
                self.status.set_error(&err);
                tracing::error!("cycle failed at {} stage: {}", err.stage(), err);
                Err(err)
            }
        }
    }

    async fn reconcile(&self, dry_run: bool, started: Instant) -> Result<CycleReport, SyncError> {
        let snapshot = snapshot::build(
            self.orchestrator.as_ref(),
            self.settings.fetch_timeout,
            &self.status,
        )
        .await?;
        let groups = snapshot.group_count();
        let instances = snapshot.instance_count();

        let rendered = self.renderer.render(&snapshot)?;
        self.snapshot.replace(snapshot);

        let write = write_artifact(
            &self.settings.output,
            &rendered,
            self.settings.validate.as_ref(),
            dry_run,
        )
        .await?;
        if !dry_run {
            self.status.record_artifact(write.digest());
        }

        let reloaded = if write.changed() {
            self.reloader.reload().await?;
            self.status.record_reload(Utc::now());
            true
        } else {
            false
        };

        Ok(CycleReport {
            groups,
            instances,
            write,
            reloaded,
            duration_ms: started.elapsed().as_millis(),
        })
    }

    /// Build and render without touching disk or status.
    pub async fn render_current(&self) -> Result<(Snapshot, String), SyncError> {
        let snapshot = snapshot::build(
            self.orchestrator.as_ref(),
            self.settings.fetch_timeout,
            &StatusTracker::new(),
        )
        .await?;
        let rendered = self.renderer.render(&snapshot)?;
        Ok((snapshot, rendered))
    }

    /// Diff the configuration the next cycle would write against disk.
    pub async fn diff(&self) -> Result<Option<ArtifactDiff>, SyncError> {
        let (_, rendered) = self.render_current().await?;
        diff_artifact(&self.settings.output, &rendered)
    }
}
