//! # Log records.
//!
//! One [`LogRecord`] becomes exactly one line in the diagnostic file:
//! ```text
//! 1520443 worker=2 level=INFO ping received
//! 1520981 worker=host level=WARN unmatched result #17 from worker 2 dropped
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::Timestamp;
use crate::worker::WorkerId;

/// Severity of a log record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only diagnostic record.
///
/// `worker = None` marks a record written by the host side of the bridge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogRecord {
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerId>,
    pub level: Level,
    pub text: String,
}

impl LogRecord {
    /// Creates a record stamped with the monotonic clock.
    pub fn new(worker: Option<WorkerId>, level: Level, text: impl Into<String>) -> Self {
        Self {
            timestamp: Timestamp::now(),
            worker,
            level,
            text: text.into(),
        }
    }

    /// Creates a host-side record.
    pub fn host(level: Level, text: impl Into<String>) -> Self {
        Self::new(None, level, text)
    }

    /// Renders the record as one newline-terminated line; embedded line breaks are escaped.
    pub fn to_line(&self) -> String {
        let text = self
            .text
            .replace('\\', "\\\\")
            .replace('\n', "\\n")
            .replace('\r', "\\r");
        format!(
            "{} worker={} level={} {}\n",
            self.timestamp,
            WhoDisplay(self.worker),
            self.level,
            text
        )
    }

    /// Mirrors the record to `tracing`.
    pub(crate) fn trace(&self) {
        let who = WhoDisplay(self.worker);
        match self.level {
            Level::Trace => tracing::trace!(worker = %who, "{}", self.text),
            Level::Debug => tracing::debug!(worker = %who, "{}", self.text),
            Level::Info => tracing::info!(worker = %who, "{}", self.text),
            Level::Warn => tracing::warn!(worker = %who, "{}", self.text),
            Level::Error => tracing::error!(worker = %who, "{}", self.text),
        }
    }
}

struct WhoDisplay(Option<WorkerId>);

impl fmt::Display for WhoDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{id}"),
            None => f.write_str("host"),
        }
    }
}
