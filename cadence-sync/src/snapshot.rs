//! Snapshot builder: one orchestrator call, then the eligibility filter.

use std::time::Duration;

use chrono::Utc;

use cadence_core::{Orchestrator, Snapshot, StatusTracker};

use crate::error::{Stage, SyncError};

/// List every application and build a fresh [`Snapshot`].
///
/// Nothing is returned on failure, so callers can never adopt a partial
/// snapshot. `status.last_sync` moves forward only on success.
pub async fn build(
    orchestrator: &dyn Orchestrator,
    deadline: Duration,
    status: &StatusTracker,
) -> Result<Snapshot, SyncError> {
    let apps = tokio::time::timeout(deadline, orchestrator.list_applications())
        .await
        .map_err(|_| SyncError::Timeout {
            stage: Stage::Fetch,
            after: deadline,
        })??;

    let snapshot = Snapshot::from_applications(&apps);
    status.set_last_sync(Utc::now());
    tracing::debug!(
        "built snapshot: {} of {} apps serviceable, {} instances",
        snapshot.group_count(),
        apps.len(),
        snapshot.instance_count()
    );
    Ok(snapshot)
}
