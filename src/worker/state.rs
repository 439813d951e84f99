//! # Worker identity and lifecycle state.
//!
//! ```text
//! Starting ──► Running ──► Stopping ──► Stopped
//!     │           │
//!     └───────────┴──────► Failed
//! ```
//!
//! ## Rules
//! - `Starting → Running` happens when the poller observes the worker's ready event
//! - `Failed` is reachable from `Starting`, `Running` and `Stopping`
//!   (a worker may fault while winding down)
//! - `Stopped` and `Failed` are terminal

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one spawned worker, unique within its supervisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Wraps a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a worker as seen from the host side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Thread spawned; task setup has not completed yet.
    Starting,
    /// Setup completed; the worker accepts commands.
    Running,
    /// Cancellation requested; waiting for the worker to acknowledge.
    Stopping,
    /// The worker exited (or was forcibly reclaimed).
    Stopped,
    /// The worker faulted.
    Failed,
}

impl WorkerState {
    /// Returns `true` for `Stopped` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Failed)
    }

    /// Returns `true` if the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Starting, Running)
                | (Starting, Stopping)
                | (Starting, Failed)
                | (Running, Stopping)
                | (Running, Stopped)
                | (Running, Failed)
                | (Stopping, Stopped)
                | (Stopping, Failed)
        )
    }

    /// Short stable name.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
            WorkerState::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
