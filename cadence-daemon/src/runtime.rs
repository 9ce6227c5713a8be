use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use cadence_core::{Config, Orchestrator, SnapshotHandle, StatusTracker};
use cadence_marathon::MarathonClient;
use cadence_sync::Reconciler;

use crate::error::{io_err, DaemonError};
use crate::protocol::{ControlCommand, ControlReply, SyncAck};
use crate::scheduler::{scheduler_task, SchedulerState};
use crate::trigger::{trigger_channel, Enqueued, TriggerSender, TriggerSource};
use crate::watcher::event_watcher_task;

/// Runtime knobs, resolved from [`Config`].
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub socket: PathBuf,
    pub tick_interval: Duration,
    pub queue_capacity: usize,
    pub reconnect_delay: Duration,
    /// Reported in status only.
    pub endpoint: String,
    /// Run one cycle before the first tick.
    pub initial_cycle: bool,
}

impl RuntimeOptions {
    pub fn from_config(config: &Config, home: &Path) -> Self {
        Self {
            socket: config.socket_path_at(home),
            tick_interval: config.scheduler.tick_interval(),
            queue_capacity: config.scheduler.queue_capacity,
            reconnect_delay: config.scheduler.reconnect_delay(),
            endpoint: config.marathon.endpoint.clone(),
            initial_cycle: true,
        }
    }
}

/// Read-only view handed to socket clients.
#[derive(Debug, Clone)]
struct DaemonState {
    status: StatusTracker,
    snapshot: SnapshotHandle,
    scheduler: SchedulerState,
    started_at: DateTime<Utc>,
    endpoint: String,
    output: PathBuf,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(config: Config, home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config, home.to_path_buf()))
}

/// Run the daemon against the configured Marathon endpoint.
pub async fn run(config: Config, home: PathBuf) -> Result<(), DaemonError> {
    let orchestrator: Arc<dyn Orchestrator> = Arc::new(MarathonClient::new(&config.marathon)?);
    let reconciler = Arc::new(Reconciler::from_config(&config, orchestrator.clone())?);
    let options = RuntimeOptions::from_config(&config, &home);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    run_with(orchestrator, reconciler, options, shutdown_tx).await
}

/// Run watcher, scheduler, socket server and signal handler until one of
/// them ends or shutdown is broadcast.
pub async fn run_with(
    orchestrator: Arc<dyn Orchestrator>,
    reconciler: Arc<Reconciler>,
    options: RuntimeOptions,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    tracing::info!(
        endpoint = %options.endpoint,
        output = %reconciler.output().display(),
        socket = %options.socket.display(),
        tick_ms = options.tick_interval.as_millis() as u64,
        "daemon starting",
    );

    let (trigger_tx, trigger_rx) = trigger_channel(options.queue_capacity);
    let scheduler_state = SchedulerState::default();
    let state = DaemonState {
        status: reconciler.status().clone(),
        snapshot: reconciler.snapshot().clone(),
        scheduler: scheduler_state.clone(),
        started_at: Utc::now(),
        endpoint: options.endpoint.clone(),
        output: reconciler.output().to_path_buf(),
    };

    // Receivers are subscribed before spawning so a task that fails on its
    // first poll cannot broadcast shutdown ahead of a sibling's subscription.
    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let triggers = trigger_tx.clone();
        let reconnect_delay = options.reconnect_delay;
        tokio::spawn(async move {
            let result =
                event_watcher_task(orchestrator, triggers, reconnect_delay, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let tick_interval = options.tick_interval;
        let initial_cycle = options.initial_cycle;
        tokio::spawn(async move {
            let result = scheduler_task(
                reconciler,
                trigger_rx,
                tick_interval,
                initial_cycle,
                scheduler_state,
                shutdown_rx,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let socket = options.socket.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                socket,
                state,
                trigger_tx,
                shutdown.clone(),
                shutdown_rx,
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Signal(err)),
                    }
                }
            }
        })
    };

    let (watcher_result, scheduler_result, socket_result, signal_result) =
        tokio::join!(watcher_handle, scheduler_handle, socket_handle, signal_handle);

    handle_join("event_watcher", watcher_result)?;
    handle_join("scheduler", scheduler_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn socket_server_task(
    socket: PathBuf,
    state: DaemonState,
    triggers: TriggerSender,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if let Some(parent) = socket.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                let triggers = triggers.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state, triggers, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    state: DaemonState,
    triggers: TriggerSender,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let command: ControlCommand = match serde_json::from_str(&line) {
            Ok(command) => command,
            Err(err) => {
                write_reply(&mut writer, &ControlReply::error(format!("unrecognised request: {err}")))
                    .await?;
                continue;
            }
        };
        tracing::debug!(command = command.name(), "control request");

        let reply = match command {
            ControlCommand::Status => ControlReply::ok(build_status_payload(&state)),
            ControlCommand::Sync => match triggers.trigger(TriggerSource::Socket) {
                Ok(enqueued) => ControlReply::ok(serde_json::to_value(SyncAck {
                    queued: true,
                    coalesced: enqueued == Enqueued::Coalesced,
                })?),
                Err(err) => ControlReply::error(err.to_string()),
            },
            ControlCommand::Stop => {
                let _ = shutdown_tx.send(());
                ControlReply::ok(json!({ "stopping": true }))
            }
        };

        write_reply(&mut writer, &reply).await?;
        if command == ControlCommand::Stop {
            break;
        }
    }

    Ok(())
}

fn build_status_payload(state: &DaemonState) -> Value {
    let status = state.status.current();
    let snapshot = state.snapshot.current();
    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at": state.started_at,
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
        "state": state.scheduler.label(),
        "endpoint": state.endpoint,
        "output": state.output,
        "healthy": status.is_healthy(),
        "status": status,
        "snapshot": {
            "groups": snapshot.group_count(),
            "instances": snapshot.instance_count(),
        },
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::SocketInUse { socket: socket.to_path_buf() });
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_reply(writer: &mut OwnedWriteHalf, reply: &ControlReply) -> Result<(), DaemonError> {
    let mut frame = serde_json::to_vec(reply)?;
    frame.push(b'\n');
    writer
        .write_all(&frame)
        .await
        .map_err(|e| io_err("control socket", e))?;
    writer.flush().await.map_err(|e| io_err("control socket", e))
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    result.unwrap_or_else(|err| {
        Err(DaemonError::Join {
            task,
            message: err.to_string(),
        })
    })
}

/// Install the fmt subscriber. `RUST_LOG` overrides the default `info`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{AppId, Instance, Snapshot, Task, WorkloadGroup};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn state() -> DaemonState {
        DaemonState {
            status: StatusTracker::new(),
            snapshot: SnapshotHandle::new(),
            scheduler: SchedulerState::default(),
            started_at: Utc::now(),
            endpoint: "http://marathon:8080".into(),
            output: PathBuf::from("/etc/nginx/nginx.conf"),
        }
    }

    #[test]
    fn status_payload_before_first_cycle() {
        let payload = build_status_payload(&state());
        assert_eq!(payload["running"], json!(true));
        assert_eq!(payload["state"], json!("idle"));
        assert_eq!(payload["healthy"], json!(true));
        assert_eq!(payload["status"]["last_sync"], Value::Null);
        assert_eq!(payload["snapshot"]["groups"], json!(0));
    }

    #[test]
    fn status_payload_reports_error_and_snapshot_counts() {
        let state = state();
        state.status.set_error("fetch failed: connection refused");
        let mut snapshot = Snapshot::default();
        snapshot.groups.insert(
            AppId::from("web"),
            WorkloadGroup {
                id: AppId::from("web"),
                env: BTreeMap::new(),
                labels: BTreeMap::new(),
                instances: vec![Instance::from(&Task {
                    id: "w1".into(),
                    ports: vec![31000],
                    ..Task::default()
                })],
            },
        );
        state.snapshot.replace(snapshot);

        let payload = build_status_payload(&state);
        assert_eq!(payload["healthy"], json!(false));
        assert_eq!(
            payload["status"]["last_error"],
            json!("fetch failed: connection refused")
        );
        assert_eq!(payload["snapshot"]["groups"], json!(1));
        assert_eq!(payload["snapshot"]["instances"], json!(1));
    }

    #[test]
    fn stale_socket_file_is_removed() {
        let dir = TempDir::new().expect("dir");
        let socket = dir.path().join("daemon.sock");
        fs::write(&socket, b"").expect("stale file");
        prepare_socket_for_bind(&socket).expect("prepare");
        assert!(!socket.exists());
    }
}
