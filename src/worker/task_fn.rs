//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: FnOnce(WorkerIo) -> Fut`. Setup is a no-op, so a
//! `TaskFn` worker is reported ready as soon as its thread and runtime are up.
//!
//! ## Example
//! ```rust
//! use tickbridge::{Reply, TaskError, TaskFn, WorkerIo};
//!
//! let task = TaskFn::new(|mut io: WorkerIo| async move {
//!     while let Some(cmd) = io.next().await {
//!         io.reply(&cmd, Reply::Pong).await?;
//!     }
//!     Ok::<_, TaskError>(())
//! });
//! # let _ = task;
//! ```

use std::future::Future;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::worker::{Task, WorkerIo};

/// Closure-backed task implementation.
pub struct TaskFn<F> {
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: FnOnce(WorkerIo) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    async fn run(self: Box<Self>, io: WorkerIo) -> Result<(), TaskError> {
        (self.f)(io).await
    }
}
