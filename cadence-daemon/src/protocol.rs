//! Control protocol spoken over the daemon's Unix socket.
//!
//! One JSON object per line in each direction. A request names a
//! [`ControlCommand`] (`{"cmd":"sync"}`); the daemon answers with a
//! [`ControlReply`] whose `data` shape depends on the command.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};

const STATUS_ATTEMPTS: u32 = 5;
const STATUS_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum ControlCommand {
    /// Report status, scheduler state and snapshot counts.
    Status,
    /// Enqueue a trigger; the cycle runs at the next tick.
    Sync,
    /// Broadcast shutdown.
    Stop,
}

impl ControlCommand {
    pub fn name(self) -> &'static str {
        match self {
            ControlCommand::Status => "status",
            ControlCommand::Sync => "sync",
            ControlCommand::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlReply {
    pub fn ok(data: Value) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { ok: false, data: None, error: Some(message.into()) }
    }

    fn into_data(self, command: ControlCommand) -> Result<Value, DaemonError> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        Err(DaemonError::Rejected {
            command: command.name(),
            message: self.error.unwrap_or_else(|| "no reason given".to_string()),
        })
    }
}

/// Answer to a `sync` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAck {
    pub queued: bool,
    /// A trigger was already pending; this request merged into it.
    pub coalesced: bool,
}

fn not_running(socket: &Path, err: &std::io::Error) -> bool {
    !socket.exists()
        || matches!(
            err.kind(),
            ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
        )
}

/// Send `command` and wait for the single reply line.
pub fn call(socket: &Path, command: ControlCommand) -> Result<ControlReply, DaemonError> {
    let mut stream = UnixStream::connect(socket).map_err(|err| {
        if not_running(socket, &err) {
            DaemonError::NotRunning { socket: socket.to_path_buf() }
        } else {
            io_err(socket, err)
        }
    })?;

    let mut frame = serde_json::to_vec(&command)?;
    frame.push(b'\n');
    stream.write_all(&frame).map_err(|e| io_err(socket, e))?;
    stream.flush().map_err(|e| io_err(socket, e))?;

    let mut line = String::new();
    let read = BufReader::new(stream)
        .read_line(&mut line)
        .map_err(|e| io_err(socket, e))?;
    if read == 0 {
        return Err(DaemonError::Protocol(format!(
            "connection closed before the {} reply",
            command.name()
        )));
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

/// Status payload. Retries briefly while a freshly started daemon binds.
pub fn request_status(socket: &Path) -> Result<Value, DaemonError> {
    let mut attempt = 1;
    loop {
        match call(socket, ControlCommand::Status) {
            Ok(reply) => return reply.into_data(ControlCommand::Status),
            Err(DaemonError::NotRunning { .. }) if attempt < STATUS_ATTEMPTS => {
                attempt += 1;
                sleep(STATUS_BACKOFF);
            }
            Err(err) => return Err(err),
        }
    }
}

pub fn request_sync(socket: &Path) -> Result<SyncAck, DaemonError> {
    let data = call(socket, ControlCommand::Sync)?.into_data(ControlCommand::Sync)?;
    Ok(serde_json::from_value(data)?)
}

pub fn request_stop(socket: &Path) -> Result<(), DaemonError> {
    call(socket, ControlCommand::Stop)?
        .into_data(ControlCommand::Stop)
        .map(|_| ())
}
