//! # The message envelope.
//!
//! [`Envelope`] is the immutable unit exchanged across the bridge in both directions.
//! Its [`Kind`] is a closed set, matched exhaustively at the poller's dispatch point.
//!
//! ## Correlation rules
//! ```text
//! Command  → correlation id required (issued by the host)
//! Result   → correlation id required (copied from the command)
//! Error    → correlation id of the command, or none for a worker fault
//! Event    → no correlation
//! Log      → no correlation
//! ```
//!
//! ## Example
//! ```rust
//! use tickbridge::{Command, Envelope, Kind, Reply};
//!
//! let cmd = Envelope::new_command(Command::Ping);
//! let id = cmd.correlation_id().unwrap();
//! let res = Envelope::result_for(id, Reply::Pong);
//!
//! assert_eq!(cmd.kind(), Kind::Command);
//! assert!(res.is_response_to(id));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::{Command, CorrelationId, Event, Fault, Reply, Timestamp};
use crate::error::BridgeError;
use crate::log_sink::LogRecord;

/// Classification of envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Command,
    Event,
    Result,
    Error,
    Log,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Command => "command",
            Kind::Event => "event",
            Kind::Result => "result",
            Kind::Error => "error",
            Kind::Log => "log",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind tag plus kind-specific payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    content = "payload",
    rename_all = "snake_case",
    deny_unknown_fields
)]
pub enum Body {
    Command(Command),
    Event(Event),
    Result(Reply),
    Error(Fault),
    Log(LogRecord),
}

impl Body {
    pub fn kind(&self) -> Kind {
        match self {
            Body::Command(_) => Kind::Command,
            Body::Event(_) => Kind::Event,
            Body::Result(_) => Kind::Result,
            Body::Error(_) => Kind::Error,
            Body::Log(_) => Kind::Log,
        }
    }
}

/// Typed, serializable message unit.
///
/// Fields are private: an envelope cannot be altered after construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<CorrelationId>,
    timestamp: Timestamp,
    body: Body,
}

impl Envelope {
    fn build(correlation_id: Option<CorrelationId>, body: Body) -> Self {
        Self {
            correlation_id,
            timestamp: Timestamp::now(),
            body,
        }
    }

    /// Creates a command with a freshly issued correlation id (host side only).
    pub fn new_command(command: Command) -> Self {
        Self::build(Some(CorrelationId::next()), Body::Command(command))
    }

    /// Creates a `Result` answering the command `id`.
    pub fn result_for(id: CorrelationId, reply: Reply) -> Self {
        Self::build(Some(id), Body::Result(reply))
    }

    /// Creates an `Error` answering the command `id`.
    pub fn error_for(id: CorrelationId, fault: Fault) -> Self {
        Self::build(Some(id), Body::Error(fault))
    }

    /// Creates an uncorrelated `Error` (worker fault not tied to a command).
    pub fn fault(fault: Fault) -> Self {
        Self::build(None, Body::Error(fault))
    }

    /// Creates an unsolicited `Event`.
    pub fn event(event: Event) -> Self {
        Self::build(None, Body::Event(event))
    }

    /// Wraps a log record; the envelope carries the record's timestamp.
    pub fn log(record: LogRecord) -> Self {
        Self {
            correlation_id: None,
            timestamp: record.timestamp,
            body: Body::Log(record),
        }
    }

    pub fn kind(&self) -> Kind {
        self.body.kind()
    }

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// Returns `true` for a `Result`/`Error` correlated to `command_id`.
    pub fn is_response_to(&self, command_id: CorrelationId) -> bool {
        matches!(self.kind(), Kind::Result | Kind::Error)
            && self.correlation_id == Some(command_id)
    }

    /// Returns `true` for traffic that may be dropped under backpressure:
    /// `Log` records and `Event::Notice`.
    pub fn is_lossy(&self) -> bool {
        match &self.body {
            Body::Log(_) => true,
            Body::Event(ev) => !ev.is_lifecycle(),
            Body::Command(_) | Body::Result(_) | Body::Error(_) => false,
        }
    }

    pub fn command(&self) -> Option<&Command> {
        match &self.body {
            Body::Command(c) => Some(c),
            _ => None,
        }
    }

    pub fn reply(&self) -> Option<&Reply> {
        match &self.body {
            Body::Result(r) => Some(r),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&Fault> {
        match &self.body {
            Body::Error(f) => Some(f),
            _ => None,
        }
    }

    pub fn event_payload(&self) -> Option<&Event> {
        match &self.body {
            Body::Event(e) => Some(e),
            _ => None,
        }
    }

    pub fn log_record(&self) -> Option<&LogRecord> {
        match &self.body {
            Body::Log(r) => Some(r),
            _ => None,
        }
    }

    /// Checks the correlation rules for this envelope's kind.
    pub fn validate(&self) -> Result<(), BridgeError> {
        match (self.kind(), self.correlation_id) {
            (Kind::Command | Kind::Result, None) => Err(BridgeError::malformed(format!(
                "{} envelope without correlation id",
                self.kind()
            ))),
            (Kind::Event | Kind::Log, Some(id)) => Err(BridgeError::malformed(format!(
                "{} envelope must not carry correlation id {id}",
                self.kind()
            ))),
            _ => Ok(()),
        }
    }
}
