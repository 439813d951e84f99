//! # Worker-side context.
//!
//! [`WorkerIo`] is everything a running [`Task`](crate::Task) may touch: the inbound
//! receiver, the outbound sender, the cooperative cancellation token and a log handle.
//! It is the only path from a worker to the host.
//!
//! ```text
//! host ── send(Command) ──► [inbound queue] ──► WorkerIo::next()
//!                                                   │
//! host ◄── poll() ◄── [outbound queue] ◄── reply / fail / emit / log
//! ```

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::channel::{Inbox, Outbox};
use crate::envelope::{Envelope, Event, Fault, Kind, Reply};
use crate::error::BridgeError;
use crate::log_sink::{Level, LogRecord, LogSink};
use crate::worker::WorkerId;

/// Worker-side context passed to [`Task::setup`](crate::Task::setup) and
/// [`Task::run`](crate::Task::run).
pub struct WorkerIo {
    worker: WorkerId,
    inbox: Inbox,
    outbox: Outbox,
    token: CancellationToken,
    log: WorkerLog,
}

impl WorkerIo {
    pub(crate) fn new(
        worker: WorkerId,
        inbox: Inbox,
        outbox: Outbox,
        token: CancellationToken,
        sink: Option<Arc<LogSink>>,
    ) -> Self {
        let log = WorkerLog {
            worker,
            sink,
            outbox: outbox.clone(),
        };
        Self {
            worker,
            inbox,
            outbox,
            token,
            log,
        }
    }

    /// Returns this worker's id.
    pub fn id(&self) -> WorkerId {
        self.worker
    }

    /// Returns the cooperative cancellation token.
    ///
    /// Internal sub-tasks should select on `token.cancelled()` at their suspension points.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` once shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the outbound sender; clone it to emit from internal sub-tasks.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Returns the log handle.
    pub fn log(&self) -> &WorkerLog {
        &self.log
    }

    /// Waits for the next inbound command.
    ///
    /// Returns `None` once cancellation is requested or the host closed the channel.
    pub async fn next(&mut self) -> Option<Envelope> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            env = self.inbox.recv() => env,
        }
    }

    /// Returns the next already-queued command without waiting.
    pub fn try_next(&mut self) -> Option<Envelope> {
        if self.token.is_cancelled() {
            return None;
        }
        self.inbox.try_recv()
    }

    /// Sends a `Result` correlated to `command`.
    pub async fn reply(&self, command: &Envelope, reply: Reply) -> Result<(), BridgeError> {
        let id = command_id(command)?;
        self.outbox.send(Envelope::result_for(id, reply)).await
    }

    /// Sends an `Error` correlated to `command`.
    pub async fn fail(&self, command: &Envelope, fault: Fault) -> Result<(), BridgeError> {
        let id = command_id(command)?;
        self.outbox.send(Envelope::error_for(id, fault)).await
    }

    /// Emits an unsolicited notice.
    ///
    /// Notices are lossy under [`Overflow::DropOldest`](crate::Overflow): a notice
    /// discarded under backpressure still returns `Ok`, the host sees it in the drop count.
    pub async fn emit(&self, topic: impl Into<String>, data: Value) -> Result<(), BridgeError> {
        let event = Event::Notice {
            topic: topic.into(),
            data,
        };
        match self.outbox.send(Envelope::event(event)).await {
            Err(BridgeError::BackpressureDrop { dropped }) => {
                tracing::trace!(worker = %self.worker, dropped, "notice discarded");
                Ok(())
            }
            other => other,
        }
    }
}

fn command_id(command: &Envelope) -> Result<crate::envelope::CorrelationId, BridgeError> {
    match (command.kind(), command.correlation_id()) {
        (Kind::Command, Some(id)) => Ok(id),
        (kind, _) => Err(BridgeError::malformed(format!(
            "cannot respond to a {kind} envelope"
        ))),
    }
}

/// Log handle of one worker.
///
/// Every record is written to the durable [`LogSink`] (if configured), mirrored to
/// `tracing`, and forwarded to the host as a lossy `Log` envelope. Never waits.
#[derive(Clone)]
pub struct WorkerLog {
    worker: WorkerId,
    sink: Option<Arc<LogSink>>,
    outbox: Outbox,
}

impl WorkerLog {
    /// Records `text` at `level`.
    pub fn record(&self, level: Level, text: impl Into<String>) {
        let record = LogRecord::new(Some(self.worker), level, text);
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.emit(&record) {
                tracing::warn!(worker = %self.worker, error = %e, "log sink write failed");
            }
        }
        record.trace();
        if let Err(e) = self.outbox.try_send(Envelope::log(record)) {
            tracing::debug!(worker = %self.worker, error = %e, "log envelope not forwarded");
        }
    }

    pub fn debug(&self, text: impl Into<String>) {
        self.record(Level::Debug, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.record(Level::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.record(Level::Warn, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.record(Level::Error, text);
    }
}
