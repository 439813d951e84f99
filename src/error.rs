//! Error types used by the bridge runtime and by worker tasks.
//!
//! This module defines two main error enums:
//!
//! - [`BridgeError`]: errors raised by the bridge itself.
//! - [`TaskError`]: errors returned by worker task executions.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging and for
//! building [`Fault`](crate::Fault) payloads.

use std::time::Duration;
use thiserror::Error;

use crate::worker::{WorkerId, WorkerState};

/// # Errors produced by the bridge.
///
/// Protocol and capacity errors are recovered locally by the bridge and reported
/// through logging; lifecycle errors are surfaced to the caller.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BridgeError {
    /// An envelope could not be decoded or violates the envelope invariants.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope {
        /// What was wrong with the envelope.
        reason: String,
    },

    /// The target worker exists but is not `Running`.
    #[error("worker {worker} unavailable (state: {state})")]
    WorkerUnavailable {
        /// Target worker.
        worker: WorkerId,
        /// State the worker was in when the send was attempted.
        state: WorkerState,
    },

    /// The worker id is not (or no longer) known to the supervisor.
    #[error("unknown worker {worker}")]
    UnknownWorker {
        /// The id that was looked up.
        worker: WorkerId,
    },

    /// A failure inside a worker task was intercepted at the thread boundary.
    #[error("worker {worker} faulted: {reason}")]
    WorkerFault {
        /// Faulted worker.
        worker: WorkerId,
        /// Panic message or error description.
        reason: String,
    },

    /// The channel is at capacity and the envelope is critical traffic.
    #[error("channel full (capacity {capacity})")]
    ChannelFull {
        /// Fixed capacity of the channel.
        capacity: usize,
    },

    /// The other end of the channel has been closed.
    #[error("channel closed")]
    ChannelClosed,

    /// A lossy envelope was discarded because the channel holds only critical traffic.
    #[error("envelope dropped under backpressure (total dropped: {dropped})")]
    BackpressureDrop {
        /// Drop count of the channel after this drop.
        dropped: u64,
    },

    /// Workers did not acknowledge cooperative cancellation in time.
    #[error("shutdown deadline {deadline:?} exceeded; stuck workers: {workers:?}")]
    ShutdownTimeout {
        /// The deadline that was exceeded.
        deadline: Duration,
        /// Workers that did not stop in time (their threads were detached).
        workers: Vec<WorkerId>,
    },

    /// The tracing subscriber could not be installed.
    #[error("logging init failed: {reason}")]
    LoggingInit {
        /// Underlying error message.
        reason: String,
    },

    /// I/O failure (log sink, thread spawn).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns a short stable label (snake_case) for use in logs and fault codes.
    ///
    /// # Example
    /// ```
    /// use tickbridge::BridgeError;
    ///
    /// let err = BridgeError::ChannelFull { capacity: 8 };
    /// assert_eq!(err.as_label(), "channel_full");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BridgeError::MalformedEnvelope { .. } => "malformed_envelope",
            BridgeError::WorkerUnavailable { .. } => "worker_unavailable",
            BridgeError::UnknownWorker { .. } => "unknown_worker",
            BridgeError::WorkerFault { .. } => "worker_fault",
            BridgeError::ChannelFull { .. } => "channel_full",
            BridgeError::ChannelClosed => "channel_closed",
            BridgeError::BackpressureDrop { .. } => "backpressure_drop",
            BridgeError::ShutdownTimeout { .. } => "shutdown_timeout",
            BridgeError::LoggingInit { .. } => "logging_init",
            BridgeError::Io(_) => "io",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            BridgeError::MalformedEnvelope { reason } => format!("malformed: {reason}"),
            BridgeError::WorkerUnavailable { worker, state } => {
                format!("worker {worker} is {state}")
            }
            BridgeError::UnknownWorker { worker } => format!("no worker {worker}"),
            BridgeError::WorkerFault { worker, reason } => {
                format!("worker {worker} fault: {reason}")
            }
            BridgeError::ChannelFull { capacity } => format!("full at {capacity}"),
            BridgeError::ChannelClosed => "channel closed".to_string(),
            BridgeError::BackpressureDrop { dropped } => format!("dropped={dropped}"),
            BridgeError::ShutdownTimeout { deadline, workers } => {
                format!("deadline {deadline:?} exceeded; stuck workers={workers:?}")
            }
            BridgeError::LoggingInit { reason } => format!("logging: {reason}"),
            BridgeError::Io(e) => format!("io: {e}"),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        BridgeError::MalformedEnvelope {
            reason: reason.into(),
        }
    }
}

/// # Errors produced by worker tasks.
///
/// Returned from [`Task::setup`](crate::Task::setup) and [`Task::run`](crate::Task::run).
/// Every variant except [`TaskError::Canceled`] marks the worker as `Failed`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// An internal operation exceeded its timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable error.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task observed cancellation and exited cooperatively.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs and fault codes.
    ///
    /// # Example
    /// ```
    /// use tickbridge::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::Fatal { error } => format!("fatal: {error}"),
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }
}

impl From<BridgeError> for TaskError {
    /// Bridge errors seen by a task (closed channel, full outbound queue) end the task.
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::ChannelClosed => TaskError::Canceled,
            other => TaskError::Fail {
                error: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        let err = BridgeError::WorkerUnavailable {
            worker: WorkerId::new(3),
            state: WorkerState::Starting,
        };
        assert_eq!(err.as_label(), "worker_unavailable");
        assert_eq!(err.to_string(), "worker 3 unavailable (state: starting)");

        let err = BridgeError::ShutdownTimeout {
            deadline: Duration::from_millis(10),
            workers: vec![WorkerId::new(1)],
        };
        assert_eq!(err.as_label(), "shutdown_timeout");
        assert!(err.as_message().contains("stuck workers"));
    }

    #[test]
    fn closed_channel_means_canceled_task() {
        assert!(matches!(
            TaskError::from(BridgeError::ChannelClosed),
            TaskError::Canceled
        ));
        let err = TaskError::from(BridgeError::ChannelFull { capacity: 2 });
        assert_eq!(err.as_label(), "task_failed");
    }
}
