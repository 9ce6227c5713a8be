//! The orchestrator capability consumed by the reconciliation loop.
//!
//! Implemented over HTTP by `cadence-marathon`; tests substitute in-memory
//! fakes.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::OrchestratorError;
use crate::types::Application;

/// Marathon event types that can change which tasks are serviceable.
pub const RELEVANT_EVENT_TYPES: &[&str] = &[
    "api_post_event",
    "status_update_event",
    "health_status_changed_event",
    "instance_health_changed_event",
    "failed_health_check_event",
    "unhealthy_task_kill_event",
    "app_terminated_event",
    "deployment_success",
    "deployment_failed",
    "deployment_step_success",
];

/// A change notification. Only its type is inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub event_type: String,
}

impl ChangeEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
        }
    }

    /// Whether this event should trigger a reconciliation.
    pub fn is_relevant(&self) -> bool {
        RELEVANT_EVENT_TYPES.contains(&self.event_type.as_str())
    }
}

/// Stream of change notifications from the orchestrator.
pub type EventStream =
    Pin<Box<dyn Stream<Item = Result<ChangeEvent, OrchestratorError>> + Send + 'static>>;

/// Source of workload state.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// List every application with its tasks embedded, in one round trip.
    async fn list_applications(&self) -> Result<Vec<Application>, OrchestratorError>;

    /// Open the change-event stream. The stream ends when the connection drops.
    async fn subscribe_events(&self) -> Result<EventStream, OrchestratorError>;
}
