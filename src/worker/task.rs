//! # Worker task abstraction.
//!
//! A [`Task`] is the unit of work a worker thread runs. It receives a [`WorkerIo`]
//! (inbound receiver, outbound sender, cancellation token, log handle) and runs
//! until it observes cancellation or completes.
//!
//! Tasks are built **on the worker thread** by the factory in a
//! [`WorkerSpec`](crate::WorkerSpec), so their construction, setup and run are all
//! covered by the worker's fault isolation.

use async_trait::async_trait;

use crate::error::TaskError;
use crate::worker::WorkerIo;

/// # Asynchronous, cancelable worker task.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tickbridge::{Command, Reply, Task, TaskError, WorkerIo};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Task for Echo {
///     async fn run(self: Box<Self>, mut io: WorkerIo) -> Result<(), TaskError> {
///         while let Some(cmd) = io.next().await {
///             if let Some(Command::Invoke { args, .. }) = cmd.command() {
///                 io.reply(&cmd, Reply::Value(args.clone())).await?;
///             }
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + 'static {
    /// Prepares the task before it is reported ready.
    ///
    /// The worker becomes `Running` only after this returns `Ok`. An error here
    /// fails the worker without calling [`run`](Task::run).
    async fn setup(&mut self, io: &mut WorkerIo) -> Result<(), TaskError> {
        let _ = io;
        Ok(())
    }

    /// Executes the task until completion or cancellation.
    ///
    /// Implementations should return promptly once [`WorkerIo::next`] yields `None`
    /// or the token in [`WorkerIo::token`] is cancelled.
    async fn run(self: Box<Self>, io: WorkerIo) -> Result<(), TaskError>;
}
