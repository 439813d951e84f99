//! Kind-specific payloads.
//!
//! Every payload is a closed enum: decoding an unknown variant or an unknown field
//! fails instead of being ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, TaskError};

/// Host → worker request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Command {
    /// Liveness probe; answered with [`Reply::Pong`].
    Ping,
    /// Asks the worker task to wind down; answered with [`Reply::Stopped`].
    Stop,
    /// Service-specific operation.
    Invoke {
        /// Operation name.
        op: String,
        /// Operation arguments.
        #[serde(default)]
        args: Value,
    },
}

/// Worker → host response to a [`Command`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Pong,
    Stopped,
    /// Service-specific result.
    Value(Value),
}

/// Diagnostic payload of an `Error` envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fault {
    /// Stable snake_case code (see `as_label` on the error types).
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl Fault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&TaskError> for Fault {
    fn from(err: &TaskError) -> Self {
        Fault::new(err.as_label(), err.as_message())
    }
}

impl From<&BridgeError> for Fault {
    fn from(err: &BridgeError) -> Self {
        Fault::new(err.as_label(), err.as_message())
    }
}

/// How a worker thread ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    /// Task returned `Ok` or observed cancellation.
    Completed,
    /// Task errored or panicked.
    Failed,
}

/// Unsolicited worker → host notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Event {
    /// Task setup completed; the worker accepts commands.
    WorkerReady,
    /// The worker task ended.
    WorkerExited {
        outcome: ExitOutcome,
    },
    /// Service-specific notification.
    Notice {
        topic: String,
        #[serde(default)]
        data: Value,
    },
}

impl Event {
    /// Lifecycle events drive the host-side state machine and are never dropped.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Event::WorkerReady | Event::WorkerExited { .. })
    }
}
