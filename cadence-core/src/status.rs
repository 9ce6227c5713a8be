//! Shared, lock-free state read by health probes: the status register and
//! the current snapshot.
//!
//! Both are `ArcSwap` cells. Writers publish a whole new value; readers get
//! an `Arc` to a complete value and never observe a half-updated one.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Snapshot;

/// Latest reconciliation outcome. No history is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Status {
    /// Last time a snapshot was built successfully.
    pub last_sync: Option<DateTime<Utc>>,
    /// Message of the most recent failure; `None` means healthy.
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    /// Last time the reload action succeeded.
    pub last_reload: Option<DateTime<Utc>>,
    /// SHA-256 of the artifact currently on disk, once known.
    pub artifact_digest: Option<String>,
    /// Reconciliation cycles attempted since start.
    pub cycles: u64,
}

impl Status {
    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }
}

/// Last-write-wins status register. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct StatusTracker {
    inner: Arc<ArcSwap<Status>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current status.
    pub fn current(&self) -> Status {
        self.inner.load().as_ref().clone()
    }

    pub fn set_last_sync(&self, at: DateTime<Utc>) {
        self.update(|s| s.last_sync = Some(at));
    }

    /// Record a failure. Replaces any previous error.
    pub fn set_error<E: fmt::Display + ?Sized>(&self, err: &E) {
        let message = err.to_string();
        let now = Utc::now();
        self.update(|s| {
            s.last_error = Some(message.clone());
            s.last_error_at = Some(now);
        });
    }

    /// Success signal at the end of a complete cycle.
    pub fn clear_error(&self) {
        self.update(|s| {
            s.last_error = None;
            s.last_error_at = None;
        });
    }

    pub fn record_reload(&self, at: DateTime<Utc>) {
        self.update(|s| s.last_reload = Some(at));
    }

    pub fn record_artifact(&self, digest: impl Into<String>) {
        let digest = digest.into();
        self.update(|s| s.artifact_digest = Some(digest.clone()));
    }

    pub fn begin_cycle(&self) {
        self.update(|s| s.cycles = s.cycles.saturating_add(1));
    }

    fn update(&self, f: impl Fn(&mut Status)) {
        self.inner.rcu(|current| {
            let mut next = Status::clone(current);
            f(&mut next);
            next
        });
    }
}

/// The most recently built snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<ArcSwap<Snapshot>>,
}

impl SnapshotHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.inner.load_full()
    }

    /// Publish `next`, discarding the previous snapshot.
    pub fn replace(&self, next: Snapshot) {
        self.inner.store(Arc::new(next));
    }
}
