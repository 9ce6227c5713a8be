//! Coalescing trigger queue between the event watcher and the scheduler.
//!
//! Producers never wait: when the queue is full the trigger is dropped,
//! because a pending trigger already guarantees a cycle that will observe
//! the newer state.

use std::fmt;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::error::DaemonError;

/// Why a reconciliation was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerSource {
    /// A relevant orchestrator event, by type.
    Event(String),
    /// The event stream (re)attached; events may have been missed.
    Connected,
    /// A `sync` request over the control socket.
    Socket,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Event(kind) => write!(f, "event:{kind}"),
            TriggerSource::Connected => f.write_str("connected"),
            TriggerSource::Socket => f.write_str("socket"),
        }
    }
}

/// Result of offering a trigger to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// Queue was full; an earlier pending trigger covers this one.
    Coalesced,
}

#[derive(Debug, Clone)]
pub struct TriggerSender {
    tx: mpsc::Sender<TriggerSource>,
}

#[derive(Debug)]
pub struct TriggerReceiver {
    rx: mpsc::Receiver<TriggerSource>,
}

/// Bounded trigger queue holding at most `capacity` pending triggers.
pub fn trigger_channel(capacity: usize) -> (TriggerSender, TriggerReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (TriggerSender { tx }, TriggerReceiver { rx })
}

impl TriggerSender {
    /// Offer a trigger without waiting.
    pub fn trigger(&self, source: TriggerSource) -> Result<Enqueued, DaemonError> {
        match self.tx.try_send(source) {
            Ok(()) => Ok(Enqueued::Queued),
            Err(TrySendError::Full(source)) => {
                tracing::debug!(%source, "trigger coalesced");
                Ok(Enqueued::Coalesced)
            }
            Err(TrySendError::Closed(_)) => Err(DaemonError::ChannelClosed("trigger queue")),
        }
    }
}

impl TriggerReceiver {
    /// Take every pending trigger and return how many there were.
    ///
    /// Errors only once all senders are gone and nothing is pending.
    pub fn drain(&mut self) -> Result<usize, DaemonError> {
        let mut drained = 0;
        loop {
            match self.rx.try_recv() {
                Ok(source) => {
                    tracing::trace!(%source, "trigger drained");
                    drained += 1;
                }
                Err(TryRecvError::Empty) => return Ok(drained),
                Err(TryRecvError::Disconnected) if drained > 0 => return Ok(drained),
                Err(TryRecvError::Disconnected) => {
                    return Err(DaemonError::ChannelClosed("trigger queue"))
                }
            }
        }
    }
}
