//! Eligibility filter: which tasks are serviceable, and the snapshot built
//! from the ones that are.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::types::{AppId, Application, Instance, Snapshot, Task, WorkloadGroup};

/// Whether `task` should receive traffic.
///
/// - no bound ports: never serviceable;
/// - app declares health checks: at least one recorded result, all alive.
///   A task with no results yet is still deploying and is skipped.
pub fn is_serviceable(app: &Application, task: &Task) -> bool {
    if task.ports.is_empty() {
        return false;
    }
    if !app.declares_health_checks() {
        return true;
    }
    !task.health_check_results.is_empty() && task.health_check_results.iter().all(|hc| hc.alive)
}

/// Build the template model for one application.
///
/// Returns `None` when no task passes [`is_serviceable`], so callers never
/// see a group that is present but empty.
pub fn workload_group(app: &Application) -> Option<WorkloadGroup> {
    let instances: Vec<Instance> = app
        .tasks
        .iter()
        .filter(|task| is_serviceable(app, task))
        .map(Instance::from)
        .collect();

    if instances.is_empty() {
        return None;
    }

    Some(WorkloadGroup {
        id: AppId::flatten(&app.id),
        env: string_env(&app.env),
        labels: app.labels.clone(),
        instances,
    })
}

impl Snapshot {
    /// Build a fresh snapshot from the orchestrator's application list.
    pub fn from_applications(apps: &[Application]) -> Snapshot {
        let mut groups = BTreeMap::new();
        for app in apps {
            let Some(group) = workload_group(app) else {
                tracing::debug!(app = %app.id, "no serviceable tasks; omitted");
                continue;
            };
            if groups.contains_key(&group.id) {
                tracing::warn!(
                    app = %app.id,
                    flattened = %group.id,
                    "flattened id collides with an earlier app; replacing it",
                );
            }
            groups.insert(group.id.clone(), group);
        }
        Snapshot { groups }
    }
}

// Secret references (objects) are not renderable values.
fn string_env(env: &BTreeMap<String, Value>) -> BTreeMap<String, String> {
    env.iter()
        .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_owned())))
        .collect()
}
