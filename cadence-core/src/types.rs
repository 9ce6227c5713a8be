//! Domain types for cadence.
//!
//! Two layers live here:
//! - the orchestrator wire model ([`Application`], [`Task`], [`HealthCheckResult`]),
//!   deserialized straight from Marathon's `/v2/apps?embed=apps.tasks` payload;
//! - the snapshot model ([`WorkloadGroup`], [`Instance`], [`Snapshot`]) that
//!   templates render from.
//!
//! Snapshot collections are `BTreeMap`s so that rendering is deterministic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Flattened application identifier, safe to use as a template token.
///
/// `/products/stores/someservice` becomes `products-stores-someservice`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub String);

impl AppId {
    /// Separator used by the orchestrator for hierarchical ids.
    pub const SEPARATOR: char = '/';
    /// Character that replaces every separator in the flattened token.
    pub const JOIN: char = '-';

    /// Flatten a raw orchestrator id: strip one leading separator, then
    /// replace every remaining separator with [`AppId::JOIN`].
    pub fn flatten(raw: &str) -> Self {
        let trimmed = raw.strip_prefix(Self::SEPARATOR).unwrap_or(raw);
        Self(trimmed.replace(Self::SEPARATOR, &Self::JOIN.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for AppId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AppId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Orchestrator wire model
// ---------------------------------------------------------------------------

/// Envelope returned by `GET /v2/apps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppsResponse {
    #[serde(default)]
    pub apps: Vec<Application>,
}

/// One orchestrator-managed application with its embedded tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Raw hierarchical id, e.g. `/products/stores/someservice`.
    pub id: String,
    /// Environment values. Marathon allows secret references (objects) here,
    /// so values stay untyped on the wire.
    #[serde(default)]
    pub env: BTreeMap<String, Value>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Declared health checks. Only their presence matters for eligibility.
    #[serde(default)]
    pub health_checks: Vec<Value>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Application {
    pub fn declares_health_checks(&self) -> bool {
        !self.health_checks.is_empty()
    }
}

/// One running task of an [`Application`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub service_ports: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub health_check_results: Vec<HealthCheckResult>,
}

/// A single recorded health-check outcome for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    pub alive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consecutive_failures: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
}

// ---------------------------------------------------------------------------
// Snapshot model
// ---------------------------------------------------------------------------

/// A serviceable instance, as templates see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub host: String,
    pub ports: Vec<u16>,
    pub service_ports: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staged_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl From<&Task> for Instance {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            host: task.host.clone(),
            ports: task.ports.clone(),
            service_ports: task.service_ports.clone(),
            staged_at: task.staged_at.clone(),
            started_at: task.started_at.clone(),
            version: task.version.clone(),
        }
    }
}

/// An application with at least one serviceable instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadGroup {
    pub id: AppId,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub instances: Vec<Instance>,
}

/// Complete point-in-time model of every serviceable workload group.
///
/// Built from scratch on every reconciliation; never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Snapshot {
    pub groups: BTreeMap<AppId, WorkloadGroup>,
}

impl Snapshot {
    pub fn get(&self, id: &AppId) -> Option<&WorkloadGroup> {
        self.groups.get(id)
    }

    pub fn contains(&self, id: &AppId) -> bool {
        self.groups.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn instance_count(&self) -> usize {
        self.groups.values().map(|g| g.instances.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
