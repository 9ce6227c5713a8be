//! Event watcher: turns the orchestrator's change stream into triggers.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::broadcast;

use cadence_core::Orchestrator;

use crate::error::DaemonError;
use crate::trigger::{TriggerSender, TriggerSource};

/// Subscribe, forward relevant events, and resubscribe after
/// `reconnect_delay` whenever the stream fails or ends.
///
/// Returns when shutdown is signalled or the trigger queue is gone.
pub async fn event_watcher_task(
    orchestrator: Arc<dyn Orchestrator>,
    triggers: TriggerSender,
    reconnect_delay: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            outcome = watch_once(orchestrator.as_ref(), &triggers) => match outcome {
                Ok(()) => tracing::warn!(
                    delay_ms = reconnect_delay.as_millis() as u64,
                    "event stream ended, reconnecting",
                ),
                Err(DaemonError::ChannelClosed(_)) => return Ok(()),
                Err(err) => tracing::warn!(
                    error = %err,
                    delay_ms = reconnect_delay.as_millis() as u64,
                    "event stream failed, reconnecting",
                ),
            }
        }

        tokio::select! {
            _ = shutdown_rx.recv() => return Ok(()),
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

/// One subscription, until the stream ends or errors.
async fn watch_once(
    orchestrator: &dyn Orchestrator,
    triggers: &TriggerSender,
) -> Result<(), DaemonError> {
    let mut events = orchestrator.subscribe_events().await?;
    triggers.trigger(TriggerSource::Connected)?;

    while let Some(event) = events.next().await {
        let event = event?;
        if event.is_relevant() {
            tracing::debug!(event = %event.event_type, "relevant event");
            triggers.trigger(TriggerSource::Event(event.event_type))?;
        } else {
            tracing::trace!(event = %event.event_type, "ignored event");
        }
    }
    Ok(())
}
