//! Serializable rendering payload built from a [`Snapshot`].
//!
//! Carries no timestamps: identical snapshots must render to identical bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cadence_core::{Instance, Snapshot, WorkloadGroup};

use crate::error::RenderError;

/// Label naming the virtual host an app should be served under.
pub const VHOST_LABEL: &str = "cadence.vhost";

/// Rendering payload handed to Tera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateContext {
    /// Apps keyed by flattened id; iterates in id order.
    pub apps: BTreeMap<String, AppCtx>,
    pub app_count: usize,
    pub task_count: usize,
    pub meta: MetaCtx,
}

/// One workload group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppCtx {
    pub app_id: String,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    /// Value of the [`VHOST_LABEL`] label, if set.
    pub vhost: Option<String>,
    pub tasks: Vec<TaskCtx>,
}

/// One serviceable instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCtx {
    pub id: String,
    pub host: String,
    /// First bound port; the common case for single-port apps.
    pub port: u16,
    pub ports: Vec<u16>,
    pub service_ports: Vec<u16>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaCtx {
    pub cadence_version: String,
}

impl From<&Instance> for TaskCtx {
    fn from(instance: &Instance) -> Self {
        Self {
            id: instance.id.clone(),
            host: instance.host.clone(),
            port: instance.ports.first().copied().unwrap_or_default(),
            ports: instance.ports.clone(),
            service_ports: instance.service_ports.clone(),
            version: instance.version.clone(),
        }
    }
}

impl From<&WorkloadGroup> for AppCtx {
    fn from(group: &WorkloadGroup) -> Self {
        Self {
            app_id: group.id.to_string(),
            env: group.env.clone(),
            labels: group.labels.clone(),
            vhost: group.labels.get(VHOST_LABEL).cloned(),
            tasks: group.instances.iter().map(TaskCtx::from).collect(),
        }
    }
}

impl TemplateContext {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let apps: BTreeMap<String, AppCtx> = snapshot
            .groups
            .iter()
            .map(|(id, group)| (id.to_string(), AppCtx::from(group)))
            .collect();
        Self {
            app_count: apps.len(),
            task_count: snapshot.instance_count(),
            apps,
            meta: MetaCtx {
                cadence_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(|source| RenderError::Render {
            template: crate::engine::ROOT_TEMPLATE,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{AppId, Task};

    fn snapshot() -> Snapshot {
        let mut labels = BTreeMap::new();
        labels.insert(VHOST_LABEL.to_string(), "api.example.com".to_string());
        let group = WorkloadGroup {
            id: AppId::from("team-api"),
            env: BTreeMap::new(),
            labels,
            instances: vec![Instance::from(&Task {
                id: "api.1".into(),
                host: "10.0.0.2".into(),
                ports: vec![31005, 31006],
                ..Task::default()
            })],
        };
        let mut snapshot = Snapshot::default();
        snapshot.groups.insert(group.id.clone(), group);
        snapshot
    }

    #[test]
    fn from_snapshot_maps_groups() {
        let ctx = TemplateContext::from_snapshot(&snapshot());
        assert_eq!(ctx.app_count, 1);
        assert_eq!(ctx.task_count, 1);
        let app = ctx.apps.get("team-api").expect("app");
        assert_eq!(app.vhost.as_deref(), Some("api.example.com"));
        assert_eq!(app.tasks[0].port, 31005);
        assert_eq!(app.tasks[0].ports, vec![31005, 31006]);
    }

    #[test]
    fn to_tera_context_succeeds() {
        let ctx = TemplateContext::from_snapshot(&snapshot());
        ctx.to_tera_context().expect("context conversion");
    }
}
