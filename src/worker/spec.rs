//! # Worker specification.
//!
//! Defines [`WorkerSpec`], the bundle handed to
//! [`Supervisor::spawn`](crate::Supervisor::spawn): a name, a task factory and
//! optional per-worker channel overrides.
//!
//! A spec can be created:
//! - **From a factory** with [`WorkerSpec::new`] (any [`Task`])
//! - **From a closure** with [`WorkerSpec::from_fn`] (wraps it in a [`TaskFn`])
//!
//! Missing overrides are inherited from [`BridgeConfig`](crate::BridgeConfig).

use std::borrow::Cow;
use std::future::Future;

use crate::channel::Overflow;
use crate::error::TaskError;
use crate::worker::{Task, TaskFn, WorkerIo};

/// Factory invoked on the worker thread to build the task.
pub type TaskFactory = Box<dyn FnOnce() -> Box<dyn Task> + Send + 'static>;

/// Specification for spawning one worker.
///
/// ## Example
/// ```rust
/// use tickbridge::{Overflow, Reply, TaskError, WorkerIo, WorkerSpec};
///
/// let spec = WorkerSpec::from_fn("pinger", |mut io: WorkerIo| async move {
///     while let Some(cmd) = io.next().await {
///         io.reply(&cmd, Reply::Pong).await?;
///     }
///     Ok::<_, TaskError>(())
/// })
/// .with_capacity(16)
/// .with_overflow(Overflow::Block);
///
/// assert_eq!(spec.name(), "pinger");
/// assert_eq!(spec.capacity(), Some(16));
/// ```
pub struct WorkerSpec {
    name: Cow<'static, str>,
    factory: TaskFactory,
    capacity: Option<usize>,
    overflow: Option<Overflow>,
}

impl WorkerSpec {
    /// Creates a spec whose task is built by `factory` on the worker thread.
    pub fn new<F, T>(name: impl Into<Cow<'static, str>>, factory: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
        T: Task,
    {
        Self {
            name: name.into(),
            factory: Box::new(move || Box::new(factory()) as Box<dyn Task>),
            capacity: None,
            overflow: None,
        }
    }

    /// Creates a spec from a closure receiving the worker's [`WorkerIo`].
    pub fn from_fn<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: FnOnce(WorkerIo) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::new(name, move || TaskFn::new(f))
    }

    /// Returns the worker name (used for thread names and logs).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the channel capacity override, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Returns the overflow policy override, if any.
    pub fn overflow(&self) -> Option<Overflow> {
        self.overflow
    }

    /// Returns a new spec with a channel capacity override.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Returns a new spec with an overflow policy override.
    pub fn with_overflow(mut self, overflow: Overflow) -> Self {
        self.overflow = Some(overflow);
        self
    }

    pub(crate) fn into_parts(self) -> (Cow<'static, str>, TaskFactory) {
        (self.name, self.factory)
    }
}

impl std::fmt::Debug for WorkerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSpec")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("overflow", &self.overflow)
            .finish_non_exhaustive()
    }
}
