use async_trait::async_trait;

use crate::envelope::{Command, Reply};
use crate::error::TaskError;
use crate::worker::WorkerLog;

/// A long-lived component hosted inside a worker by a [`ServiceSet`](crate::ServiceSet).
///
/// `handle` returns `None` when the command is not meant for this service; the set then
/// offers it to the next one.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use serde_json::json;
/// use tickbridge::{Command, Reply, Service, WorkerLog};
///
/// struct Clock;
///
/// #[async_trait]
/// impl Service for Clock {
///     fn name(&self) -> &str { "clock" }
///
///     async fn handle(&mut self, cmd: &Command, _log: &WorkerLog) -> Option<Reply> {
///         match cmd {
///             Command::Invoke { op, .. } if op == "now" => Some(Reply::Value(json!(0))),
///             _ => None,
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + 'static {
    /// Stable name used in logs.
    fn name(&self) -> &str;

    /// Called once during worker setup, before the worker is reported ready.
    async fn start(&mut self, log: &WorkerLog) -> Result<(), TaskError> {
        let _ = log;
        Ok(())
    }

    async fn handle(&mut self, command: &Command, log: &WorkerLog) -> Option<Reply>;

    /// Called once when the worker stops. Errors are logged, not propagated.
    async fn stop(&mut self, log: &WorkerLog) -> Result<(), TaskError> {
        let _ = log;
        Ok(())
    }
}
