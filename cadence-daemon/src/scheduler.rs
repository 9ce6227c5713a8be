//! Ticking scheduler: at most one reconciliation per tick, never two at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use cadence_sync::Reconciler;

use crate::error::DaemonError;
use crate::trigger::TriggerReceiver;

/// Scheduler state as seen by status queries: `Idle` or `Reconciling`.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    reconciling: Arc<AtomicBool>,
}

impl SchedulerState {
    pub fn is_reconciling(&self) -> bool {
        self.reconciling.load(Ordering::SeqCst)
    }

    pub fn label(&self) -> &'static str {
        if self.is_reconciling() {
            "reconciling"
        } else {
            "idle"
        }
    }

    fn set_reconciling(&self, value: bool) {
        self.reconciling.store(value, Ordering::SeqCst);
    }
}

/// Drive reconciliation cycles from the trigger queue.
///
/// With `run_initial` set, one cycle runs before the first tick. After
/// that, each tick drains every pending trigger and runs a single cycle if
/// there were any; a tick with nothing pending does nothing. Cycle failures
/// are recorded by the reconciler and never stop the scheduler.
pub async fn scheduler_task(
    reconciler: Arc<Reconciler>,
    mut triggers: TriggerReceiver,
    tick_interval: Duration,
    run_initial: bool,
    state: SchedulerState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if run_initial {
        run_cycle(&reconciler, &state, "startup").await;
    }

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let pending = match triggers.drain() {
                    Ok(pending) => pending,
                    Err(DaemonError::ChannelClosed(_)) => {
                        tracing::info!("trigger queue closed, scheduler exiting");
                        break;
                    }
                    Err(err) => return Err(err),
                };
                if pending == 0 {
                    continue;
                }
                tracing::debug!(pending, "coalesced triggers into one cycle");
                run_cycle(&reconciler, &state, "trigger").await;
            }
        }
    }

    Ok(())
}

async fn run_cycle(reconciler: &Reconciler, state: &SchedulerState, reason: &'static str) {
    state.set_reconciling(true);
    // Errors are already logged and stored in the status register.
    if let Ok(report) = reconciler.run_cycle(false).await {
        tracing::debug!(
            reason,
            groups = report.groups,
            instances = report.instances,
            written = report.write.changed(),
            reloaded = report.reloaded,
            duration_ms = report.duration_ms as u64,
            "cycle finished",
        );
    }
    state.set_reconciling(false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_labels() {
        let state = SchedulerState::default();
        assert_eq!(state.label(), "idle");
        state.set_reconciling(true);
        assert_eq!(state.clone().label(), "reconciling");
    }
}
