//! cadence daemon runtime: event watcher + ticking scheduler + socket server.

mod error;
pub mod protocol;
mod runtime;
pub mod scheduler;
pub mod trigger;
pub mod watcher;

pub use error::DaemonError;
pub use protocol::{call, request_status, request_stop, request_sync, ControlCommand, ControlReply, SyncAck};
pub use runtime::{init_tracing, run, run_with, start_blocking, RuntimeOptions};
pub use scheduler::{scheduler_task, SchedulerState};
pub use trigger::{trigger_channel, Enqueued, TriggerReceiver, TriggerSender, TriggerSource};
pub use watcher::event_watcher_task;
